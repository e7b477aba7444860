//! Packed state bitfield carried in fan broadcasts.
//!
//! Sub-field 0 of a broadcast's `state_string` is a 32-bit integer that packs
//! the whole fan state:
//!
//! | bits    | mask         | field                         |
//! |---------|--------------|-------------------------------|
//! | 0..=2   | `0x0000_0007`| speed                         |
//! | 3       | `0x0000_0008`| cool light                    |
//! | 4       | `0x0000_0010`| power                         |
//! | 5       | `0x0000_0020`| led                           |
//! | 7       | `0x0000_0080`| sleep                         |
//! | 8..=14  | `0x0000_7F00`| brightness                    |
//! | 15      | `0x0000_8000`| warm light                    |
//! | 16..=19 | `0x000F_0000`| timer (hours)                 |
//! | 24..=31 | `0xFF00_0000`| timer elapsed, in 4 min steps |

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

const SPEED_MASK: u32 = 0x07;
const COOL_MASK: u32 = 0x08;
const POWER_MASK: u32 = 0x10;
const LED_MASK: u32 = 0x20;
const SLEEP_MASK: u32 = 0x80;
const BRIGHTNESS_MASK: u32 = 0x7F00;
const WARM_MASK: u32 = 0x8000;
const TIMER_MASK: u32 = 0x0F_0000;
const ELAPSED_MASK: u32 = 0xFF00_0000;

const BRIGHTNESS_SHIFT: u32 = 8;
const TIMER_SHIFT: u32 = 16;
const ELAPSED_SHIFT: u32 = 24;
const ELAPSED_MINUTES_PER_STEP: u16 = 4;

/// Light color mode derived from the cool and warm bits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum ColorMode {
    Off,
    Cool,
    Warm,
    /// Both cool and warm channels lit.
    Daylight,
}

impl ColorMode {
    pub fn from_channels(cool: bool, warm: bool) -> Self {
        match (cool, warm) {
            (true, true) => ColorMode::Daylight,
            (true, false) => ColorMode::Cool,
            (false, true) => ColorMode::Warm,
            (false, false) => ColorMode::Off,
        }
    }

    /// Returns the `(cool, warm)` channel pair for this mode.
    pub fn channels(self) -> (bool, bool) {
        match self {
            ColorMode::Off => (false, false),
            ColorMode::Cool => (true, false),
            ColorMode::Warm => (false, true),
            ColorMode::Daylight => (true, true),
        }
    }
}

/// Full fan state as reported by a state broadcast.
///
/// Values are reported exactly as the device packs them; nothing is clamped.
///
/// # Example
///
/// ```
/// use atomberg_fans_rs::{ColorMode, DeviceState};
///
/// let state = DeviceState::decode("176").unwrap();
/// assert!(state.power());
/// assert!(state.led());
/// assert_eq!(state.speed(), 0);
/// assert_eq!(state.color_mode(), ColorMode::Off);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    power: bool,
    led: bool,
    sleep: bool,
    speed: u8,
    timer: u8,
    timer_elapsed_mins: u16,
    brightness: u8,
    cool: bool,
    warm: bool,
    color_mode: ColorMode,
    device_id: String,
    raw_state: String,
}

impl DeviceState {
    /// Decode a state from the textual bitfield of a broadcast.
    ///
    /// The text must be a base-10 integer of any length, optionally signed;
    /// it is reduced modulo 2^32 so only its low 32 bits are used.
    ///
    /// ```
    /// use atomberg_fans_rs::DeviceState;
    ///
    /// assert!(DeviceState::decode("not-a-number").is_err());
    /// assert_eq!(DeviceState::decode(" 3 ").unwrap().speed(), 3);
    /// ```
    pub fn decode(raw: &str) -> Result<Self> {
        let text = raw.trim();
        let (negative, digits) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_bitfield(raw));
        }

        // Wrapping arithmetic is exact modulo 2^32.
        let value = digits.bytes().fold(0u32, |acc, b| {
            acc.wrapping_mul(10).wrapping_add(u32::from(b - b'0'))
        });
        Ok(Self::from_bits(if negative { value.wrapping_neg() } else { value }))
    }

    pub fn from_bits(v: u32) -> Self {
        let cool = v & COOL_MASK != 0;
        let warm = v & WARM_MASK != 0;
        DeviceState {
            power: v & POWER_MASK != 0,
            led: v & LED_MASK != 0,
            sleep: v & SLEEP_MASK != 0,
            speed: (v & SPEED_MASK) as u8,
            timer: ((v & TIMER_MASK) >> TIMER_SHIFT) as u8,
            timer_elapsed_mins: ((v & ELAPSED_MASK) >> ELAPSED_SHIFT) as u16
                * ELAPSED_MINUTES_PER_STEP,
            brightness: ((v & BRIGHTNESS_MASK) >> BRIGHTNESS_SHIFT) as u8,
            cool,
            warm,
            color_mode: ColorMode::from_channels(cool, warm),
            device_id: String::new(),
            raw_state: String::new(),
        }
    }

    /// Pack this state back into the broadcast bit layout.
    ///
    /// Each field is masked to its width; elapsed minutes are truncated to
    /// whole 4 minute steps.
    ///
    /// ```
    /// use atomberg_fans_rs::DeviceState;
    ///
    /// assert_eq!(DeviceState::from_bits(0x0302_C5B3).to_bits(), 0x0302_C5B3);
    /// ```
    pub fn to_bits(&self) -> u32 {
        let mut v = u32::from(self.speed) & SPEED_MASK;
        if self.cool {
            v |= COOL_MASK;
        }
        if self.power {
            v |= POWER_MASK;
        }
        if self.led {
            v |= LED_MASK;
        }
        if self.sleep {
            v |= SLEEP_MASK;
        }
        v |= (u32::from(self.brightness) << BRIGHTNESS_SHIFT) & BRIGHTNESS_MASK;
        if self.warm {
            v |= WARM_MASK;
        }
        v |= (u32::from(self.timer) << TIMER_SHIFT) & TIMER_MASK;
        let steps = u32::from(self.timer_elapsed_mins / ELAPSED_MINUTES_PER_STEP);
        v |= (steps << ELAPSED_SHIFT) & ELAPSED_MASK;
        v
    }

    pub(crate) fn with_origin(mut self, device_id: &str, raw_state: &str) -> Self {
        self.device_id = device_id.to_string();
        self.raw_state = raw_state.to_string();
        self
    }

    pub fn power(&self) -> bool {
        self.power
    }

    pub fn led(&self) -> bool {
        self.led
    }

    pub fn sleep(&self) -> bool {
        self.sleep
    }

    /// Raw 3-bit speed. Devices use 0 to 6.
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Raw 4-bit timer. Devices use 0 (off) and 1 to 4 hours.
    pub fn timer(&self) -> u8 {
        self.timer
    }

    pub fn timer_elapsed_mins(&self) -> u16 {
        self.timer_elapsed_mins
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn cool(&self) -> bool {
        self.cool
    }

    pub fn warm(&self) -> bool {
        self.warm
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// Device identifier from the broadcast envelope; empty if none was sent.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The complete `state_string` this state was decoded from.
    pub fn raw_state(&self) -> &str {
        &self.raw_state
    }
}
