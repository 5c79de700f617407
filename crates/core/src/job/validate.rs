//! Caller-side sanity checks for a job.
//!
//! The pipeline itself never validates; front ends call [`validate_job`]
//! before handing a job over.

use std::path::Path;

use super::error::JobError;
use super::types::{ConversionJob, EncodeSettings};

/// Largest accepted target width.
pub const MAX_WIDTH: u32 = 2048;
/// Largest accepted target height.
pub const MAX_HEIGHT: u32 = 2048;
/// Largest accepted target frame rate.
pub const MAX_FPS: u32 = 60;
/// Largest accepted speed multiplier.
pub const MAX_SPEED: f64 = 10.0;

const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Validates paths and settings of a job.
pub fn validate_job(job: &ConversionJob) -> Result<(), JobError> {
    if !job.input_path.is_file() {
        return Err(JobError::InputNotFound {
            path: job.input_path.clone(),
        });
    }
    validate_output_path(&job.output_path)?;
    validate_settings(&job.settings)
}

/// Validates encode settings without touching the filesystem.
pub fn validate_settings(settings: &EncodeSettings) -> Result<(), JobError> {
    if let Some(fps) = settings.fps {
        check_range("fps", fps as f64, 1.0, MAX_FPS as f64)?;
    }
    if let Some(width) = settings.width {
        check_range("width", width as f64, 1.0, MAX_WIDTH as f64)?;
    }
    if let Some(height) = settings.height {
        check_range("height", height as f64, 1.0, MAX_HEIGHT as f64)?;
    }
    // Zero speed would divide every timestamp by zero.
    if !(settings.speed > 0.0 && settings.speed <= MAX_SPEED) {
        return Err(JobError::OutOfRange {
            field: "speed",
            min: 0.0,
            max: MAX_SPEED,
            value: settings.speed,
        });
    }
    check_range("webp.quality", settings.webp.quality as f64, 0.0, 100.0)?;
    check_range("webp.compression", settings.webp.compression as f64, 0.0, 6.0)?;
    Ok(())
}

/// Checks that the output file can be written.
pub fn validate_output_path(path: &Path) -> Result<(), JobError> {
    let name = match path.file_name() {
        Some(name) if !name.is_empty() => name.to_string_lossy().to_string(),
        _ => return Err(JobError::invalid_output("Output filename cannot be empty.")),
    };

    if path.is_dir() {
        return Err(JobError::invalid_output(format!(
            "Output path is a directory:\n{}",
            path.display()
        )));
    }

    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => Path::new("."),
    };

    if !parent.exists() {
        return Err(JobError::invalid_output(format!(
            "Output directory does not exist:\n{}",
            parent.display()
        )));
    }

    if tempfile::NamedTempFile::new_in(parent).is_err() {
        return Err(JobError::invalid_output(format!(
            "Output directory is not writeable:\n{}",
            parent.display()
        )));
    }

    if name.contains(INVALID_FILENAME_CHARS) {
        return Err(JobError::invalid_output(format!(
            "Output filename contains invalid characters:\n{}",
            name
        )));
    }

    Ok(())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), JobError> {
    if value < min || value > max {
        return Err(JobError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}
