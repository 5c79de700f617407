//! Conversion job model.
//!
//! A [`ConversionJob`] names an input video, an output file and the
//! [`EncodeSettings`] applied to it. The output suffix alone selects the
//! pipeline: `.webp` renders directly, anything else goes through
//! palette generation, paletted render and gifsicle optimization.

mod error;
mod types;
mod validate;

pub use error::JobError;
pub use types::{
    ConversionJob, DitherMode, EncodeSettings, OutputKind, PaletteMode, ToolPaths, WebpOptions,
};
pub use validate::{
    validate_job, validate_output_path, validate_settings, MAX_FPS, MAX_HEIGHT, MAX_SPEED,
    MAX_WIDTH,
};
