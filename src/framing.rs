//! Framing of state broadcast datagrams.

use serde_json::{Map, Value};

/// Reason a datagram was not turned into an [`Envelope`].
///
/// The broadcast port is shared, so these are expected noise rather than errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Skip {
    #[error("payload is not valid utf-8")]
    NotUtf8,

    #[error("payload is not a json object: {0}")]
    NotJson(String),

    #[error("json object has no state_string")]
    MissingStateString,
}

/// A framed state broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Message identifier used for deduplication; empty when absent.
    pub message_id: String,
    /// Opaque device identifier; empty when absent.
    pub device_id: String,
    /// The unsplit `state_string`.
    pub state_string: String,
    /// `state_string` split on `,`. Never empty.
    pub fields: Vec<String>,
}

impl Envelope {
    /// The packed state bitfield (sub-field 0).
    pub fn bitfield(&self) -> &str {
        self.fields.first().map_or("", String::as_str)
    }
}

/// Frame a raw broadcast payload.
///
/// The payload is either JSON text or the hex-ASCII encoding of that text.
///
/// # Examples
///
/// ```
/// use atomberg_fans_rs::framing::frame;
///
/// let envelope = frame(br#"{"device_id":"f1","message_id":"m1","state_string":"176,0"}"#).unwrap();
/// assert_eq!(envelope.device_id, "f1");
/// assert_eq!(envelope.bitfield(), "176");
///
/// assert!(frame(b"test").is_err());
/// ```
pub fn frame(payload: &[u8]) -> Result<Envelope, Skip> {
    let text = std::str::from_utf8(payload).map_err(|_| Skip::NotUtf8)?;
    let ascii_data = unhex(text);
    let ascii_data = ascii_data.as_deref().unwrap_or(text);

    let object: Map<String, Value> =
        serde_json::from_str(ascii_data).map_err(|e| Skip::NotJson(e.to_string()))?;

    let state_string = object
        .get("state_string")
        .and_then(Value::as_str)
        .ok_or(Skip::MissingStateString)?
        .to_string();

    Ok(Envelope {
        message_id: text_field(&object, "message_id"),
        device_id: text_field(&object, "device_id"),
        fields: state_string.split(',').map(String::from).collect(),
        state_string,
    })
}

/// Decode text made only of hex digits into the UTF-8 text it encodes.
///
/// Any text that is not pure hex, or that does not decode to UTF-8, yields
/// `None` so the caller uses the original text.
// NOTE: this is content sniffing, not a declared encoding. JSON objects start
// with `{` and can never be mistaken for hex, but the rule is kept as devices
// send it.
fn unhex(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    if text.len() % 2 != 0 {
        return None;
    }

    let bytes = text
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

fn text_field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
