//! Administrative path for the Medium tier, shared by the `tiercache` binary and tests.
mod command;
mod runner;
mod util;

pub use command::Command;
pub use runner::{AdminContext, OutputMode, run};
pub use util::{RecordInfo, RecordStatus, format_millis, inspect};
