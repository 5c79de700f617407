//! Mock media probe for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::probe::{MediaInfo, MediaProbe, ProbeError};

/// Mock implementation of the MediaProbe trait.
///
/// Returns a fixed [`MediaInfo`] (or a failure), optionally after a delay,
/// and records every probed path.
#[derive(Debug, Clone)]
pub struct MockProbe {
    info: MediaInfo,
    delay: Arc<RwLock<Option<Duration>>>,
    fail_with: Arc<RwLock<Option<String>>>,
    probed: Arc<RwLock<Vec<PathBuf>>>,
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProbe {
    /// Create a mock reporting a 10 second, 24 fps, 1280x720 clip.
    pub fn new() -> Self {
        Self::with_info(MediaInfo {
            duration_secs: Some(10.0),
            fps: Some(24.0),
            width: Some(1280),
            height: Some(720),
        })
    }

    pub fn with_info(info: MediaInfo) -> Self {
        Self {
            info,
            delay: Arc::new(RwLock::new(None)),
            fail_with: Arc::new(RwLock::new(None)),
            probed: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Make every later probe take `delay` before answering.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Make every later probe fail with `reason`.
    pub async fn set_failure(&self, reason: impl Into<String>) {
        *self.fail_with.write().await = Some(reason.into());
    }

    /// Paths probed so far.
    pub async fn probed_paths(&self) -> Vec<PathBuf> {
        self.probed.read().await.clone()
    }
}

#[async_trait]
impl MediaProbe for MockProbe {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        self.probed.write().await.push(path.to_path_buf());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = self.fail_with.read().await.clone() {
            return Err(ProbeError::ProbeFailed { reason });
        }
        Ok(self.info.clone())
    }
}
