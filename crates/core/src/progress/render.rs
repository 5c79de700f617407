//! Render-step progress tracking.

use super::parse::parse_progress_line;

/// What a render output line says about progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderReading {
    /// Step-local percentage (0-100).
    Percent(f64),
    /// Only a frame count is known.
    Frames(u64),
}

/// Tracks the frame count and step-local progress of one render.
#[derive(Debug, Clone)]
pub struct RenderTracker {
    duration_secs: Option<f64>,
    estimated_frames: Option<u64>,
    frames: u64,
}

impl RenderTracker {
    pub fn new(duration_secs: Option<f64>, estimated_frames: Option<u64>) -> Self {
        Self {
            duration_secs: duration_secs.filter(|d| *d > 0.0),
            estimated_frames: estimated_frames.filter(|f| *f > 0),
            frames: 0,
        }
    }

    /// Highest frame number reported so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Whether progress can be expressed as a percentage.
    pub fn is_determinate(&self) -> bool {
        self.duration_secs.is_some() || self.estimated_frames.is_some()
    }

    /// Starts a new render; the frame count resets.
    pub fn reset(&mut self) {
        self.frames = 0;
    }

    /// Feeds one stdout line of the render process.
    pub fn observe(&mut self, line: &str) -> Option<RenderReading> {
        let sample = parse_progress_line(line);

        if let Some(frame) = sample.frame {
            // Counts only move forward.
            if frame > self.frames {
                self.frames = frame;
            }
        }

        if let Some(duration) = self.duration_secs {
            let us = sample.out_time_us?;
            let pct = (us as f64 / (duration * 1_000_000.0) * 100.0).min(100.0);
            return Some(RenderReading::Percent(pct));
        }

        sample.frame?;
        match self.estimated_frames {
            Some(total) => {
                let pct = (self.frames as f64 / total as f64 * 100.0).min(100.0);
                Some(RenderReading::Percent(pct))
            }
            None => Some(RenderReading::Frames(self.frames)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_based_progress() {
        let mut tracker = RenderTracker::new(Some(10.0), None);
        assert_eq!(tracker.observe("frame=5"), None);
        assert_eq!(tracker.frames(), 5);
        assert_eq!(
            tracker.observe("out_time_ms=5000000"),
            Some(RenderReading::Percent(50.0))
        );
        assert_eq!(
            tracker.observe("out_time_ms=20000000"),
            Some(RenderReading::Percent(100.0))
        );
    }

    #[test]
    fn test_frame_estimate_progress() {
        let mut tracker = RenderTracker::new(None, Some(200));
        assert_eq!(tracker.observe("frame=50"), Some(RenderReading::Percent(25.0)));
        assert_eq!(tracker.observe("out_time_ms=123"), None);
        assert_eq!(tracker.observe("frame=400"), Some(RenderReading::Percent(100.0)));
    }

    #[test]
    fn test_indeterminate_progress() {
        let mut tracker = RenderTracker::new(None, None);
        assert!(!tracker.is_determinate());
        assert_eq!(tracker.observe("frame=  7"), Some(RenderReading::Frames(7)));
        assert_eq!(tracker.observe("speed=1.2x"), None);
    }

    #[test]
    fn test_frame_count_ignores_lower_values() {
        let mut tracker = RenderTracker::new(None, None);
        tracker.observe("frame=30");
        assert_eq!(tracker.observe("frame=12"), Some(RenderReading::Frames(30)));
        assert_eq!(tracker.frames(), 30);

        tracker.reset();
        assert_eq!(tracker.frames(), 0);
    }
}
