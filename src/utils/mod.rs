//! Shared helpers
//!
//! Timing, logging setup and assertion helpers for case bodies.

mod assert;
mod logger;
mod timer;

pub use assert::{assert_not_raises, assert_raises};
pub use logger::{init_logger, LogLevel};
pub use timer::{format_hms, Stopwatch, Timer};
