//! Fan speed and relative speed steps.

use serde::{Deserialize, Serialize};

/// Absolute fan speed, with valid values from 0 to 6.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct FanSpeed {
    pub(crate) value: u8,
}

impl FanSpeed {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 6;

    /// Get the speed value.
    pub fn value(self) -> u8 {
        self.value
    }

    /// Create a new FanSpeed with the given value.
    ///
    /// Returns `None` if value is outside the valid range (0-6).
    ///
    /// # Examples
    ///
    /// ```
    /// use atomberg_fans_rs::FanSpeed;
    ///
    /// assert!(FanSpeed::create(0).is_some());
    /// assert!(FanSpeed::create(6).is_some());
    /// assert!(FanSpeed::create(7).is_none());
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        if Self::is_valid(value) {
            Some(FanSpeed { value })
        } else {
            None
        }
    }

    /// Create a FanSpeed, clamping out of range values to the nearest bound.
    ///
    /// ```
    /// use atomberg_fans_rs::FanSpeed;
    ///
    /// assert_eq!(FanSpeed::saturating(3).value(), 3);
    /// assert_eq!(FanSpeed::saturating(9).value(), 6);
    /// ```
    pub fn saturating(value: u8) -> Self {
        FanSpeed {
            value: value.min(Self::MAX),
        }
    }

    /// Offset this speed by `delta`, staying within 0-6.
    ///
    /// ```
    /// use atomberg_fans_rs::{FanSpeed, SpeedDelta};
    ///
    /// let up = SpeedDelta::create(1).unwrap();
    /// let down = SpeedDelta::create(-1).unwrap();
    /// assert_eq!(FanSpeed::saturating(6).offset(up).value(), 6);
    /// assert_eq!(FanSpeed::saturating(0).offset(down).value(), 0);
    /// assert_eq!(FanSpeed::saturating(3).offset(up).value(), 4);
    /// ```
    pub fn offset(self, delta: SpeedDelta) -> Self {
        let next = (i16::from(self.value) + i16::from(delta.value))
            .clamp(i16::from(Self::MIN), i16::from(Self::MAX));
        FanSpeed { value: next as u8 }
    }

    fn is_valid(value: u8) -> bool {
        (Self::MIN..=Self::MAX).contains(&value)
    }
}

/// Relative speed change understood by the fan: -1, or 1 to 5.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SpeedDelta {
    pub(crate) value: i8,
}

impl SpeedDelta {
    const MIN: i8 = -1;
    const MAX: i8 = 5;

    pub fn value(self) -> i8 {
        self.value
    }

    /// Returns None if value is outside -1 to 5, or is 0.
    ///
    /// ```
    /// use atomberg_fans_rs::SpeedDelta;
    ///
    /// assert!(SpeedDelta::create(-2).is_none());
    /// assert!(SpeedDelta::create(-1).is_some());
    /// assert!(SpeedDelta::create(0).is_none());
    /// assert!(SpeedDelta::create(5).is_some());
    /// assert!(SpeedDelta::create(6).is_none());
    /// ```
    pub fn create(value: i8) -> Option<Self> {
        if value != 0 && (Self::MIN..=Self::MAX).contains(&value) {
            Some(SpeedDelta { value })
        } else {
            None
        }
    }
}
