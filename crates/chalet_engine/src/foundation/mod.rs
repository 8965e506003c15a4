//! Foundation utilities: logging, math aliases and timing

pub mod logging;
pub mod math;
pub mod time;
