use regex_lite::Regex;

use super::{types::Config, ConfigError};
use crate::job::validate_settings;

/// Validate configuration
/// Currently validates:
/// - Step weights sum to 100
/// - Kill grace period is not 0
/// - Palette file name is a plain, non-empty name
/// - Every stderr ignore pattern compiles
/// - Encode defaults are in range
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let pipeline = &config.pipeline;

    let total = pipeline.weights.total();
    if total != 100 {
        return Err(ConfigError::ValidationError(format!(
            "pipeline.weights must sum to 100, got {}",
            total
        )));
    }

    if pipeline.kill_grace_ms == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.kill_grace_ms cannot be 0".to_string(),
        ));
    }

    let name = pipeline.palette_file_name.trim();
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(ConfigError::ValidationError(format!(
            "pipeline.palette_file_name must be a plain file name, got {:?}",
            pipeline.palette_file_name
        )));
    }

    for pattern in &pipeline.stderr_ignore {
        Regex::new(pattern).map_err(|e| {
            ConfigError::ValidationError(format!(
                "pipeline.stderr_ignore pattern {:?} is invalid: {}",
                pattern, e
            ))
        })?;
    }

    validate_settings(&config.encode)
        .map_err(|e| ConfigError::ValidationError(format!("encode: {}", e)))?;

    Ok(())
}
