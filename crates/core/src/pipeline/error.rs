//! Error types for the pipeline module.

use std::path::PathBuf;
use thiserror::Error;

use crate::plan::LogTag;

/// Reasons a job stops before producing its output.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The job's temp directory could not be created.
    #[error("Failed to create temp directory: {0}")]
    TempDir(#[source] std::io::Error),

    /// A step's process could not be launched.
    #[error("{tag}: failed to start: {reason}")]
    Launch { tag: LogTag, reason: String },

    /// A step's process exited unsuccessfully. `code` is -1 after a signal.
    #[error("{tag}: exited with code {code}")]
    ProcessFailed {
        tag: LogTag,
        code: i32,
        crashed: bool,
    },

    /// Supervising a process failed.
    #[error("{tag}: {reason}")]
    Process { tag: LogTag, reason: String },

    /// The palette step reported success but left no file.
    #[error("Palette file missing before GIF render.")]
    MissingPalette { path: PathBuf },

    /// A step ran past its wall-clock limit.
    #[error("{tag}: timed out after {secs} seconds")]
    Timeout { tag: LogTag, secs: u64 },

    /// The caller cancelled the job.
    #[error("Operation was cancelled by user.")]
    Cancelled,
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = PipelineError::ProcessFailed {
            tag: LogTag::GifsicleOptimize,
            code: 2,
            crashed: false,
        };
        assert_eq!(err.to_string(), "gifsicle-optimize: exited with code 2");

        let err = PipelineError::Timeout {
            tag: LogTag::FfmpegRender,
            secs: 3600,
        };
        assert_eq!(err.to_string(), "ffmpeg-render: timed out after 3600 seconds");

        let err = PipelineError::Launch {
            tag: LogTag::FfmpegPalette,
            reason: "No such file or directory (os error 2)".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "ffmpeg-palette: failed to start: No such file or directory (os error 2)"
        );
        assert!(PipelineError::Cancelled.is_cancelled());
    }
}
