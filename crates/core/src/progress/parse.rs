//! Parsing of ffmpeg `-progress` output.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static FRAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"frame=\s*(\d+)").unwrap());
static OUT_TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"out_time_ms=(\d+)").unwrap());

/// Fields extracted from one chunk of progress output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSample {
    /// Frames written so far.
    pub frame: Option<u64>,
    /// Elapsed output time in microseconds (ffmpeg names it `_ms`).
    pub out_time_us: Option<u64>,
}

/// Extracts `frame=` and `out_time_ms=` values from `text`.
pub fn parse_progress_line(text: &str) -> ProgressSample {
    ProgressSample {
        frame: capture_u64(&FRAME_RE, text),
        out_time_us: capture_u64(&OUT_TIME_RE, text),
    }
}

fn capture_u64(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
}

/// Expected frame count for a clip, when both inputs are known.
pub fn estimate_total_frames(duration_secs: Option<f64>, fps: Option<f64>) -> Option<u64> {
    match (duration_secs, fps) {
        (Some(d), Some(f)) if d > 0.0 && f > 0.0 => Some((d * f) as u64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_line() {
        let sample = parse_progress_line("frame=  12\nout_time_ms=123456");
        assert_eq!(sample.frame, Some(12));
        assert_eq!(sample.out_time_us, Some(123456));
    }

    #[test]
    fn test_parse_progress_line_missing_fields() {
        let sample = parse_progress_line("bitrate=1000");
        assert_eq!(sample, ProgressSample::default());
    }

    #[test]
    fn test_parse_stats_line() {
        let sample = parse_progress_line("frame=  240 fps= 60 q=-0.0 size=    1024kB");
        assert_eq!(sample.frame, Some(240));
        assert_eq!(sample.out_time_us, None);
    }

    #[test]
    fn test_estimate_total_frames() {
        assert_eq!(estimate_total_frames(Some(10.0), Some(24.0)), Some(240));
        assert_eq!(estimate_total_frames(None, Some(24.0)), None);
        assert_eq!(estimate_total_frames(Some(10.0), None), None);
        assert_eq!(estimate_total_frames(Some(0.0), Some(24.0)), None);
    }

    #[test]
    fn test_estimate_truncates() {
        // 23.976 fps over 10 s is 239.76 frames.
        assert_eq!(estimate_total_frames(Some(10.0), Some(23.976)), Some(239));
    }
}
