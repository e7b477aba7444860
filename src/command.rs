//! Partial-state control commands for Atomberg fans.

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::{FanSpeed, SpeedDelta, Timer};

type Result<T> = std::result::Result<T, Error>;

/// A control command to send to a fan.
///
/// Only the keys that were set are serialized; anything left unset keeps its
/// current value on the fan.
///
/// # Creating Commands
///
/// 1. **From a single attribute** using the [`From`] trait:
///    ```
///    use atomberg_fans_rs::{Command, Timer};
///    let command = Command::from(Timer::TwoHours);
///    assert_eq!(command.to_json().unwrap(), r#"{"timer":2}"#);
///    ```
///
/// 2. **Builder pattern** for combining multiple attributes:
///    ```
///    use atomberg_fans_rs::{Command, FanSpeed};
///    let mut command = Command::new();
///    command.power(true);
///    command.speed(FanSpeed::create(4).unwrap());
///    assert_eq!(command.to_json().unwrap(), r#"{"power":true,"speed":4}"#);
///    ```
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Command {
    pub(crate) power: Option<bool>,
    pub(crate) speed: Option<u8>,
    #[serde(rename = "speedDelta")]
    pub(crate) speed_delta: Option<i8>,
    pub(crate) led: Option<bool>,
    pub(crate) timer: Option<u8>,
    pub(crate) sleep: Option<bool>,
}

impl Command {
    /// Create a new empty command.
    ///
    /// At least one attribute must be set before the command can be sent.
    ///
    /// # Examples
    ///
    /// ```
    /// use atomberg_fans_rs::Command;
    ///
    /// let command = Command::new();
    /// assert_eq!(command.is_valid(), false);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if this command contains at least one attribute.
    pub fn is_valid(&self) -> bool {
        self.power.is_some()
            || self.speed.is_some()
            || self.speed_delta.is_some()
            || self.led.is_some()
            || self.timer.is_some()
            || self.sleep.is_some()
    }

    pub fn power(&mut self, on: bool) -> &mut Self {
        self.power = Some(on);
        self
    }

    pub fn speed(&mut self, speed: FanSpeed) -> &mut Self {
        self.speed = Some(speed.value());
        self
    }

    /// Change the speed relative to whatever the fan is running at.
    pub fn speed_delta(&mut self, delta: SpeedDelta) -> &mut Self {
        self.speed_delta = Some(delta.value());
        self
    }

    pub fn led(&mut self, on: bool) -> &mut Self {
        self.led = Some(on);
        self
    }

    pub fn timer(&mut self, timer: Timer) -> &mut Self {
        self.timer = Some(timer.value());
        self
    }

    pub fn sleep(&mut self, on: bool) -> &mut Self {
        self.sleep = Some(on);
        self
    }

    /// Serialize to the compact JSON body sent on the wire.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::JsonDump)
    }
}

impl From<FanSpeed> for Command {
    fn from(speed: FanSpeed) -> Self {
        let mut c = Command::new();
        c.speed(speed);
        c
    }
}

impl From<SpeedDelta> for Command {
    fn from(delta: SpeedDelta) -> Self {
        let mut c = Command::new();
        c.speed_delta(delta);
        c
    }
}

impl From<Timer> for Command {
    fn from(timer: Timer) -> Self {
        let mut c = Command::new();
        c.timer(timer);
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_only_set_keys_are_sent() {
        let mut command = Command::new();
        command.power(true);
        assert_eq!(command.to_json().unwrap(), r#"{"power":true}"#);
    }

    #[test]
    fn test_all_keys() {
        let mut command = Command::new();
        command
            .power(false)
            .speed(FanSpeed::create(6).unwrap())
            .speed_delta(SpeedDelta::create(-1).unwrap())
            .led(true)
            .timer(Timer::FourHours)
            .sleep(true);

        let body: Value = serde_json::from_str(&command.to_json().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "power": false,
                "speed": 6,
                "speedDelta": -1,
                "led": true,
                "timer": 4,
                "sleep": true,
            })
        );
    }

    #[test]
    fn test_empty_command_is_invalid() {
        assert!(!Command::new().is_valid());
        assert_eq!(Command::new().to_json().unwrap(), "{}");
        assert!(Command::from(Timer::Off).is_valid());
    }

    #[test]
    fn test_from_attributes() {
        assert_eq!(
            Command::from(FanSpeed::create(2).unwrap()).to_json().unwrap(),
            r#"{"speed":2}"#
        );
        assert_eq!(
            Command::from(SpeedDelta::create(3).unwrap()).to_json().unwrap(),
            r#"{"speedDelta":3}"#
        );
    }

    #[test]
    fn test_parse_wire_body() {
        let command: Command = serde_json::from_str(r#"{"led":false,"timer":1}"#).unwrap();
        let mut expected = Command::new();
        expected.led(false).timer(Timer::OneHour);
        assert_eq!(command, expected);
    }
}
