//! Pipeline steps and their transition function.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::OutputKind;

/// Position of a job in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Idle,
    Palette,
    Render,
    Optimize,
    Finished,
}

impl Step {
    /// First step that launches a process for `kind`.
    pub fn first(kind: OutputKind) -> Self {
        match kind {
            OutputKind::Gif => Self::Palette,
            OutputKind::Webp => Self::Render,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Palette => "palette",
            Self::Render => "render",
            Self::Optimize => "optimize",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step that follows a successful `step`.
///
/// `frames` is the number of frames rendered so far. A GIF of exactly one
/// frame has nothing for gifsicle to optimize.
pub fn next_step(kind: OutputKind, step: Step, frames: u64) -> Step {
    match (kind, step) {
        (_, Step::Idle) => Step::first(kind),
        (_, Step::Palette) => Step::Render,
        (OutputKind::Webp, Step::Render) => Step::Finished,
        (OutputKind::Gif, Step::Render) if frames == 1 => Step::Finished,
        (OutputKind::Gif, Step::Render) => Step::Optimize,
        (_, Step::Optimize) | (_, Step::Finished) => Step::Finished,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(kind: OutputKind, frames: u64) -> Vec<Step> {
        let mut steps = vec![Step::Idle];
        let mut step = Step::Idle;
        while step != Step::Finished {
            step = next_step(kind, step, frames);
            steps.push(step);
        }
        steps
    }

    #[test]
    fn test_gif_order() {
        assert_eq!(
            walk(OutputKind::Gif, 120),
            vec![
                Step::Idle,
                Step::Palette,
                Step::Render,
                Step::Optimize,
                Step::Finished
            ]
        );
    }

    #[test]
    fn test_webp_order() {
        assert_eq!(
            walk(OutputKind::Webp, 120),
            vec![Step::Idle, Step::Render, Step::Finished]
        );
    }

    #[test]
    fn test_single_frame_gif_skips_optimize() {
        assert_eq!(
            walk(OutputKind::Gif, 1),
            vec![Step::Idle, Step::Palette, Step::Render, Step::Finished]
        );
        // Zero frames is not the shortcut.
        assert_eq!(next_step(OutputKind::Gif, Step::Render, 0), Step::Optimize);
    }

    #[test]
    fn test_finished_is_absorbing() {
        assert_eq!(next_step(OutputKind::Gif, Step::Finished, 5), Step::Finished);
    }
}
