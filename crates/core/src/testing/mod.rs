//! Testing utilities for end-to-end pipeline tests.
//!
//! [`FakeTools`] writes shell scripts that behave like ffmpeg, ffprobe and
//! gifsicle closely enough for the pipeline: they honour the last argument
//! as the output file, print progress lines and exit with a chosen code.
//! [`MockProbe`] replaces ffprobe entirely.
//!
//! # Example
//!
//! ```rust,ignore
//! use vidgif_core::testing::{FakeTools, MockProbe};
//!
//! let fakes = FakeTools::builder().frames(1).build()?;
//! let (worker, events) = ConversionWorker::new(job, fakes.paths().clone(), config);
//! let worker = worker.with_probe(Arc::new(MockProbe::new()));
//! ```

#[cfg(unix)]
mod fake_tools;
mod mock_probe;

#[cfg(unix)]
pub use fake_tools::{FakeTools, FakeToolsBuilder};
pub use mock_probe::MockProbe;
