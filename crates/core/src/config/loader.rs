use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

const ENV_PREFIX: &str = "VIDGIF_";

fn base_figment() -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).split("__")
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = base_figment()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Like [`load_config`], but a missing file means defaults plus environment
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        return load_config(path);
    }

    base_figment()
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{DitherMode, PaletteMode};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_empty_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.tools.ffmpeg, PathBuf::from("ffmpeg"));
        assert_eq!(config.pipeline.kill_grace_ms, 100);
        assert_eq!(config.pipeline.weights.render, 70);
        assert!(config.encode.loop_playback);
    }

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[tools]
ffmpeg = "/opt/ffmpeg/bin/ffmpeg"

[pipeline]
kill_grace_ms = 250
step_timeout_secs = 0
stderr_ignore = ["deprecated pixel format"]

[pipeline.weights]
palette = 20
render = 60
optimize = 20

[encode]
fps = 15
width = 480
dither = "bayer"
palette_mode = "diff"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.tools.ffmpeg, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.tools.gifsicle, PathBuf::from("gifsicle"));
        assert_eq!(config.pipeline.kill_grace_ms, 250);
        assert_eq!(config.pipeline.step_timeout(), None);
        assert_eq!(config.pipeline.weights.palette, 20);
        assert_eq!(config.pipeline.stderr_ignore, vec!["deprecated pixel format"]);
        assert_eq!(config.encode.fps, Some(15));
        assert_eq!(config.encode.width, Some(480));
        assert_eq!(config.encode.dither, DitherMode::Bayer);
        assert_eq!(config.encode.palette_mode, PaletteMode::Diff);
    }

    #[test]
    fn test_load_config_from_str_bad_enum() {
        let toml = r#"
[encode]
dither = "ordered"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/vidgif.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_or_default_without_file() {
        let config = load_config_or_default(Path::new("/nonexistent/vidgif.toml")).unwrap();
        assert_eq!(config.pipeline.palette_file_name, "palette.png");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[tools]
gifsicle = "/usr/local/bin/gifsicle"

[pipeline]
palette_file_name = "pal.png"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.tools.gifsicle, PathBuf::from("/usr/local/bin/gifsicle"));
        assert_eq!(config.pipeline.palette_file_name, "pal.png");
        assert_eq!(config.pipeline.probe_timeout_secs, 10);
    }
}
