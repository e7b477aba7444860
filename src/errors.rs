/// All error types that can occur when talking to Atomberg fans.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// A network socket operation failed.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// Attempted to send a [`crate::Command`] with no keys set.
    #[error("invalid command; no attributes set")]
    NoAttribute,

    /// The packed state field of a broadcast was not an integer.
    #[error("invalid state bitfield {0:?}: not an integer")]
    InvalidBitfield(String),

    /// [`crate::BroadcastListener::start`] was called on a running listener.
    #[error("broadcast listener is already running")]
    AlreadyRunning,

    /// The listener thread could not be spawned or panicked.
    #[error("listener thread error: {0}")]
    ListenerThread(String),
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new invalid bitfield error
    pub fn invalid_bitfield(raw: &str) -> Self {
        Error::InvalidBitfield(raw.to_string())
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
