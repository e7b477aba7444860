//! Sleep-off timer presets.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// Timer setting, in whole hours until the fan turns off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumIter, Display)]
pub enum Timer {
    #[default]
    Off = 0,
    #[strum(to_string = "1h")]
    OneHour = 1,
    #[strum(to_string = "2h")]
    TwoHours = 2,
    #[strum(to_string = "3h")]
    ThreeHours = 3,
    #[strum(to_string = "4h")]
    FourHours = 4,
}

impl Timer {
    /// Look up a timer by its wire value.
    ///
    /// ```
    /// use atomberg_fans_rs::Timer;
    ///
    /// assert_eq!(Timer::create(2), Some(Timer::TwoHours));
    /// assert_eq!(Timer::create(5), None);
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        Timer::iter().find(|timer| timer.value() == value)
    }

    pub fn value(self) -> u8 {
        self as u8
    }
}
