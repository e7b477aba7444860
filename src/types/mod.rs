//! Value types for fan control parameters.

mod speed;
mod timer;

pub use speed::{FanSpeed, SpeedDelta};
pub use timer::Timer;
