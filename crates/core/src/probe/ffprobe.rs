//! ffprobe-backed [`MediaProbe`].

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::error::ProbeError;
use super::{MediaInfo, MediaProbe};

/// Runs `ffprobe -print_format json` and reads the first video stream.
pub struct FfprobeProbe {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(output: &str) -> Result<MediaInfo, ProbeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            #[serde(default)]
            format: Option<ProbeFormat>,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
            duration: Option<String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| ProbeError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");

        // Container duration first, stream duration as fallback.
        let duration_secs = probe
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .or_else(|| video_stream.and_then(|s| s.duration.as_deref()))
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| *d > 0.0);

        Ok(MediaInfo {
            duration_secs,
            fps: video_stream
                .and_then(|s| s.r_frame_rate.as_deref())
                .and_then(parse_frame_rate),
            width: video_stream.and_then(|s| s.width),
            height: video_stream.and_then(|s| s.height),
        })
    }
}

/// Parses a frame rate like "24000/1001", "30/1" or "25".
pub(crate) fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den > 0.0 {
                num / den
            } else {
                return None;
            }
        }
        None => rate.trim().parse::<f64>().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        debug!("Probing {} with {}", path.display(), self.ffprobe_path.display());

        let run = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, run)
            .await
            .map_err(|_| ProbeError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::FfprobeNotFound {
                        path: self.ffprobe_path.clone(),
                    }
                } else {
                    ProbeError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ProbeError::ProbeFailed {
                reason: format!(
                    "ffprobe failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output_video() {
        let json = r#"{
            "format": {
                "filename": "clip.mp4",
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": "12.480000"
            },
            "streams": [
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "r_frame_rate": "0/0"
                },
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1280,
                    "height": 720,
                    "r_frame_rate": "24000/1001"
                }
            ]
        }"#;

        let info = FfprobeProbe::parse_probe_output(json).unwrap();
        assert!((info.duration_secs.unwrap() - 12.48).abs() < 0.001);
        assert!((info.fps.unwrap() - 23.976).abs() < 0.01);
        assert_eq!(info.width, Some(1280));
        assert_eq!(info.height, Some(720));
    }

    #[test]
    fn test_parse_probe_output_stream_duration_fallback() {
        let json = r#"{
            "format": {},
            "streams": [
                { "codec_type": "video", "r_frame_rate": "30/1", "duration": "4.0" }
            ]
        }"#;

        let info = FfprobeProbe::parse_probe_output(json).unwrap();
        assert_eq!(info.duration_secs, Some(4.0));
        assert_eq!(info.fps, Some(30.0));
    }

    #[test]
    fn test_parse_probe_output_no_video() {
        let json = r#"{ "format": { "duration": "N/A" }, "streams": [] }"#;
        let info = FfprobeProbe::parse_probe_output(json).unwrap();
        assert_eq!(info, MediaInfo::default());
    }

    #[test]
    fn test_parse_probe_output_garbage() {
        let result = FfprobeProbe::parse_probe_output("not json");
        assert!(matches!(result, Err(ProbeError::ParseError { .. })));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[tokio::test]
    async fn test_probe_missing_input() {
        let probe = FfprobeProbe::new("ffprobe", Duration::from_secs(1));
        let result = probe.probe(Path::new("/nonexistent/clip.mp4")).await;
        assert!(matches!(result, Err(ProbeError::InputNotFound { .. })));
    }

    #[tokio::test]
    async fn test_probe_missing_binary() {
        let input = tempfile::NamedTempFile::new().unwrap();
        let probe = FfprobeProbe::new("/nonexistent/ffprobe", Duration::from_secs(1));
        let result = probe.probe(input.path()).await;
        assert!(matches!(result, Err(ProbeError::FfprobeNotFound { .. })));
    }
}
