pub mod timer;

pub use timer::{FrameLog, FrameStats, HighPrecisionTimer, ManualTimer, Timer};
