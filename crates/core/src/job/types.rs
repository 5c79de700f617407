//! Types describing a single conversion job.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Locations of the external encoder binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    /// Path to the ffmpeg binary.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    /// Path to the ffprobe binary.
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
    /// Path to the gifsicle binary.
    #[serde(default = "default_gifsicle")]
    pub gifsicle: PathBuf,
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_gifsicle() -> PathBuf {
    PathBuf::from("gifsicle")
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            gifsicle: default_gifsicle(),
        }
    }
}

impl ToolPaths {
    /// Creates tool paths from explicit locations.
    pub fn new(
        ffmpeg: impl Into<PathBuf>,
        ffprobe: impl Into<PathBuf>,
        gifsicle: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            gifsicle: gifsicle.into(),
        }
    }
}

/// Dithering algorithm used by `paletteuse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DitherMode {
    /// No dithering (smallest file, lowest quality).
    None,
    /// Floyd-Steinberg error diffusion.
    #[default]
    FloydSteinberg,
    /// Bayer 5x5 ordered dithering.
    Bayer,
    /// Sierra2 Lite error diffusion.
    #[serde(rename = "sierra2_4a")]
    SierraLite,
}

impl DitherMode {
    /// Returns the value passed to `paletteuse=dither=`.
    pub fn ffmpeg_value(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FloydSteinberg => "floyd_steinberg",
            Self::Bayer => "bayer:bayer_scale=5",
            Self::SierraLite => "sierra2_4a",
        }
    }
}

/// Statistics mode used by `palettegen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteMode {
    /// Single static palette over the whole clip.
    Single,
    /// Prioritizes frame-to-frame changes.
    Diff,
    /// All pixels weighted equally.
    #[default]
    Full,
}

impl PaletteMode {
    /// Returns the value passed to `palettegen=stats_mode=`.
    pub fn ffmpeg_value(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Diff => "diff",
            Self::Full => "full",
        }
    }
}

/// Which pipeline an output file selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Palette, render, optimize.
    Gif,
    /// Render only.
    Webp,
}

impl OutputKind {
    /// Picks the pipeline from the output path suffix.
    pub fn from_path(path: &Path) -> Self {
        if path
            .to_string_lossy()
            .to_ascii_lowercase()
            .ends_with(".webp")
        {
            Self::Webp
        } else {
            Self::Gif
        }
    }

    /// Human readable format label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gif => "GIF",
            Self::Webp => "WebP",
        }
    }
}

/// WebP encoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebpOptions {
    /// Lossy quality (0-100).
    #[serde(default = "default_webp_quality")]
    pub quality: u8,
    /// Compression effort (0-6).
    #[serde(default = "default_webp_compression")]
    pub compression: u8,
    /// Lossless mode; quality and compression are not passed when set.
    #[serde(default)]
    pub lossless: bool,
}

fn default_webp_quality() -> u8 {
    90
}

fn default_webp_compression() -> u8 {
    4
}

impl Default for WebpOptions {
    fn default() -> Self {
        Self {
            quality: default_webp_quality(),
            compression: default_webp_compression(),
            lossless: false,
        }
    }
}

/// Encoding parameters shared by every step of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeSettings {
    /// Target frame rate. `None` keeps the source rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    /// Target width. `None` derives it from the height (or keeps the source).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Target height. `None` derives it from the width (or keeps the source).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Playback speed multiplier.
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Dithering for GIF output.
    #[serde(default)]
    pub dither: DitherMode,
    /// Palette statistics mode for GIF output.
    #[serde(default)]
    pub palette_mode: PaletteMode,
    /// Loop forever (`true`) or play once.
    #[serde(default = "default_loop")]
    pub loop_playback: bool,
    /// WebP-only options.
    #[serde(default)]
    pub webp: WebpOptions,
}

fn default_speed() -> f64 {
    1.0
}

fn default_loop() -> bool {
    true
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            fps: None,
            width: None,
            height: None,
            speed: default_speed(),
            dither: DitherMode::default(),
            palette_mode: PaletteMode::default(),
            loop_playback: default_loop(),
            webp: WebpOptions::default(),
        }
    }
}

/// A conversion request. Immutable once handed to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    /// Source video.
    pub input_path: PathBuf,
    /// Destination GIF or WebP file.
    pub output_path: PathBuf,
    /// Encoding parameters.
    pub settings: EncodeSettings,
    /// Known source duration in seconds, if any.
    pub total_duration: Option<f64>,
}

impl ConversionJob {
    /// Creates a job with default settings.
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            settings: EncodeSettings::default(),
            total_duration: None,
        }
    }

    /// Replaces the encoding settings.
    pub fn with_settings(mut self, settings: EncodeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the known source duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.total_duration = Some(secs);
        self
    }

    /// Pipeline selected by the output path.
    pub fn output_kind(&self) -> OutputKind {
        OutputKind::from_path(&self.output_path)
    }

    /// Duration usable for progress computation (known and positive).
    pub fn known_duration(&self) -> Option<f64> {
        self.total_duration.filter(|d| *d > 0.0)
    }
}
