//! Conversion pipeline orchestration.
//!
//! A [`ConversionWorker`] walks a job through its [`Step`]s, one external
//! process at a time:
//!
//! ```text
//! GIF:  Palette -> Render -> Optimize -> Finished
//! WebP: Render -> Finished
//! ```
//!
//! A GIF render of exactly one frame skips the optimize step. Progress, log
//! lines and the final [`JobResult`] arrive as [`JobEvent`]s on the channel
//! returned by [`ConversionWorker::new`].

mod cancel;
mod error;
mod filter;
mod step;
mod types;
mod worker;

pub use cancel::CancelHandle;
pub use error::PipelineError;
pub use filter::StderrFilter;
pub use step::{next_step, Step};
pub use types::{JobEvent, JobResult, JobStatus};
pub use worker::{ConversionWorker, JobHandle};
