//! Error types for the process runner.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`ProcessRunner::start`](super::ProcessRunner::start).
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A previous process has not exited yet.
    #[error("Process already running")]
    AlreadyRunning,

    /// The OS refused to start the program.
    #[error("{source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
