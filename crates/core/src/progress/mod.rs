//! Progress parsing and aggregation.
//!
//! - [`parse_progress_line`] reads `frame=` and `out_time_ms=` from ffmpeg output
//! - [`RenderTracker`] turns render output into step-local progress
//! - [`ProgressAggregator`] maps step-local progress onto one global bar

mod aggregate;
mod parse;
mod render;

pub use aggregate::{Percent, ProgressAggregator, ProgressUpdate, StepWeights};
pub use parse::{estimate_total_frames, parse_progress_line, ProgressSample};
pub use render::{RenderReading, RenderTracker};
