pub mod clock;
pub mod timer;

pub use clock::{MonotonicClock, TrialClock};
pub use timer::{CalibrationStats, HighPrecisionTimer, Timer};
