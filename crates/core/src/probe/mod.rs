//! Media inspection through ffprobe.
//!
//! The pipeline only needs the source frame rate (for the frame estimate)
//! and the duration (for time-based render progress). [`MediaProbe`] is the
//! seam tests replace.

mod error;
mod ffprobe;

pub use error::ProbeError;
pub use ffprobe::FfprobeProbe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the pipeline learns about a source video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Container duration, when reported.
    pub duration_secs: Option<f64>,
    /// Frame rate of the first video stream.
    pub fps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Reads stream metadata of a media file.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Returns the probe's name for logging.
    fn name(&self) -> &str;

    /// Inspects the file at `path`.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError>;
}
