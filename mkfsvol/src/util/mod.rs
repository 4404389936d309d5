//! Subprocess utilities.
//!
//! - `run_command` - run a command, draining stdout/stderr concurrently
//! - `OutputObserver` - receives the drained output line by line

mod log_stream;
mod process;

pub use log_stream::{OutputObserver, OutputStream, TracingObserver};
pub use process::run_command;
