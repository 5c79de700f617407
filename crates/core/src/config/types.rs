use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::job::{EncodeSettings, ToolPaths};
use crate::progress::StepWeights;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolPaths,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Encode defaults for jobs built by the driver
    #[serde(default)]
    pub encode: EncodeSettings,
}

/// Orchestrator tuning, fixed for the lifetime of a job
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Progress share of each GIF step
    #[serde(default)]
    pub weights: StepWeights,
    /// Wait between SIGTERM and SIGKILL when stopping a process (default: 100)
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
    /// Wall-clock limit per step, 0 disables (default: 3600)
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    /// Limit for the ffprobe call (default: 10)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Case-insensitive patterns of encoder stderr lines to drop
    #[serde(default = "default_stderr_ignore")]
    pub stderr_ignore: Vec<String>,
    /// Name of the palette image inside the job's temp directory
    #[serde(default = "default_palette_file_name")]
    pub palette_file_name: String,
    /// Parent for job temp directories (default: system temp dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weights: StepWeights::default(),
            kill_grace_ms: default_kill_grace_ms(),
            step_timeout_secs: default_step_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            stderr_ignore: default_stderr_ignore(),
            palette_file_name: default_palette_file_name(),
            temp_root: None,
        }
    }
}

impl PipelineConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// `None` when steps may run forever.
    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn default_kill_grace_ms() -> u64 {
    100
}

fn default_step_timeout_secs() -> u64 {
    3600
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_stderr_ignore() -> Vec<String> {
    vec![
        "input frame is not in sRGB".to_string(),
        r"Last message repeated \d+ times".to_string(),
    ]
}

fn default_palette_file_name() -> String {
    "palette.png".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.kill_grace(), Duration::from_millis(100));
        assert_eq!(config.step_timeout(), Some(Duration::from_secs(3600)));
        assert_eq!(config.palette_file_name, "palette.png");
        assert_eq!(config.stderr_ignore.len(), 2);
        assert!(config.temp_root.is_none());
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = PipelineConfig {
            step_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.step_timeout(), None);
    }
}
