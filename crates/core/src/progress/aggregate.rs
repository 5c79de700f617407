//! Step-weighted global progress.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::OutputKind;
use crate::pipeline::Step;

/// Share of the global bar given to each GIF step. Must sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepWeights {
    #[serde(default = "default_palette_weight")]
    pub palette: u32,
    #[serde(default = "default_render_weight")]
    pub render: u32,
    #[serde(default = "default_optimize_weight")]
    pub optimize: u32,
}

fn default_palette_weight() -> u32 {
    10
}

fn default_render_weight() -> u32 {
    70
}

fn default_optimize_weight() -> u32 {
    20
}

impl Default for StepWeights {
    fn default() -> Self {
        Self {
            palette: default_palette_weight(),
            render: default_render_weight(),
            optimize: default_optimize_weight(),
        }
    }
}

impl StepWeights {
    pub fn total(&self) -> u32 {
        self.palette + self.render + self.optimize
    }

    /// Weight of a single step (zero for `Idle` and `Finished`).
    pub fn weight(&self, step: Step) -> u32 {
        match step {
            Step::Palette => self.palette,
            Step::Render => self.render,
            Step::Optimize => self.optimize,
            Step::Idle | Step::Finished => 0,
        }
    }

    /// Sum of the weights of every step strictly before `step`.
    pub fn completed_before(&self, step: Step) -> u32 {
        match step {
            Step::Idle | Step::Palette => 0,
            Step::Render => self.palette,
            Step::Optimize => self.palette + self.render,
            Step::Finished => self.total(),
        }
    }
}

/// A progress value: a percentage or "unknown, keep pulsing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Percent {
    Value(u8),
    Indeterminate,
}

impl Percent {
    /// Sentinel used by integer-only consumers.
    pub const INDETERMINATE: i32 = -1;

    /// Integer form, with `-1` for indeterminate.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Value(v) => *v as i32,
            Self::Indeterminate => Self::INDETERMINATE,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}%", v),
            Self::Indeterminate => f.write_str("--"),
        }
    }
}

/// Progress update published to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub percent: Percent,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(percent: Percent, message: impl Into<String>) -> Self {
        Self {
            percent,
            message: message.into(),
        }
    }

    pub fn indeterminate(message: impl Into<String>) -> Self {
        Self::new(Percent::Indeterminate, message)
    }
}

/// Maps step-local progress to the job-wide percentage.
#[derive(Debug, Clone, Copy)]
pub struct ProgressAggregator {
    weights: StepWeights,
    kind: OutputKind,
}

impl ProgressAggregator {
    pub fn new(weights: StepWeights, kind: OutputKind) -> Self {
        Self { weights, kind }
    }

    /// Global percentage for `local` (0-100) progress within `step`.
    ///
    /// WebP jobs are a single step and report `local` unchanged.
    pub fn global(&self, step: Step, local: f64) -> u8 {
        let local = local.clamp(0.0, 100.0);
        let total = match self.kind {
            OutputKind::Webp if step == Step::Finished => 100.0,
            OutputKind::Webp => local,
            OutputKind::Gif => {
                self.weights.completed_before(step) as f64
                    + self.weights.weight(step) as f64 * local / 100.0
            }
        };
        total.round().clamp(0.0, 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_100() {
        assert_eq!(StepWeights::default().total(), 100);
    }

    #[test]
    fn test_gif_weighted_progress() {
        let agg = ProgressAggregator::new(StepWeights::default(), OutputKind::Gif);
        assert_eq!(agg.global(Step::Palette, 0.0), 0);
        assert_eq!(agg.global(Step::Palette, 100.0), 10);
        assert_eq!(agg.global(Step::Render, 0.0), 10);
        assert_eq!(agg.global(Step::Render, 50.0), 45);
        assert_eq!(agg.global(Step::Render, 100.0), 80);
        assert_eq!(agg.global(Step::Optimize, 30.0), 86);
        assert_eq!(agg.global(Step::Optimize, 100.0), 100);
        assert_eq!(agg.global(Step::Finished, 0.0), 100);
    }

    #[test]
    fn test_local_progress_is_clamped() {
        let agg = ProgressAggregator::new(StepWeights::default(), OutputKind::Gif);
        assert_eq!(agg.global(Step::Render, 250.0), 80);
        assert_eq!(agg.global(Step::Render, -5.0), 10);
    }

    #[test]
    fn test_webp_passes_through() {
        let agg = ProgressAggregator::new(StepWeights::default(), OutputKind::Webp);
        assert_eq!(agg.global(Step::Render, 0.0), 0);
        assert_eq!(agg.global(Step::Render, 42.4), 42);
        assert_eq!(agg.global(Step::Render, 100.0), 100);
        assert_eq!(agg.global(Step::Finished, 0.0), 100);
    }

    #[test]
    fn test_progress_non_decreasing_across_steps() {
        let agg = ProgressAggregator::new(StepWeights::default(), OutputKind::Gif);
        let mut last = 0;
        for step in [Step::Palette, Step::Render, Step::Optimize] {
            for local in (0..=100).step_by(5) {
                let value = agg.global(step, local as f64);
                assert!(value >= last, "{:?} {} went from {} to {}", step, local, last, value);
                last = value;
            }
        }
        assert_eq!(agg.global(Step::Finished, 0.0), 100);
    }

    #[test]
    fn test_percent_sentinel() {
        assert_eq!(Percent::Value(42).as_i32(), 42);
        assert_eq!(Percent::Indeterminate.as_i32(), -1);
        assert!(ProgressUpdate::indeterminate("Rendering").percent.is_indeterminate());
    }
}
