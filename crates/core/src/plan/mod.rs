//! Command plan builders.
//!
//! Compiles a [`ConversionJob`](crate::job::ConversionJob) into the exact
//! ffmpeg/gifsicle invocation for each pipeline step. No process handling
//! happens here.

mod builder;
mod types;

pub use builder::{base_filters, gif_render_plan, optimize_plan, palette_plan, webp_render_plan};
pub use types::{CommandPlan, LogTag};
