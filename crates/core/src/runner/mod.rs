//! External process supervision.

mod error;
mod lines;
mod process;

pub use error::RunnerError;
pub use lines::LineBuffer;
pub use process::{ExitKind, OutputStream, ProcessRunner, RunnerEvent};
