pub mod player;
pub mod timer;

pub use player::ClockedPlayer;
pub use timer::{CalibrationStats, HighPrecisionTimer, ManualTimer, Timer};
