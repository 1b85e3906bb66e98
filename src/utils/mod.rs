//! Utility modules: clock, numeric conversions, developer logging.
pub mod clock;
pub mod devlog;
pub mod num;
