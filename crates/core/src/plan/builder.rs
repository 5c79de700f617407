//! Argument builders for each pipeline step.
//!
//! Every builder is a pure function of the job and tool paths. The flag
//! layout is the compatibility contract with ffmpeg and gifsicle, so changes
//! here must keep the exact spelling of filters and options.

use std::path::Path;

use crate::job::{ConversionJob, EncodeSettings, ToolPaths};

use super::types::{CommandPlan, LogTag};

/// Log level passed to every ffmpeg invocation.
const FFMPEG_LOG_LEVEL: &str = "warning";

/// Builds the palette generation step (GIF only).
pub fn palette_plan(job: &ConversionJob, tools: &ToolPaths, palette_file: &Path) -> CommandPlan {
    let mut filters = base_filters(&job.settings);
    filters.push("format=rgb24".to_string());
    filters.push(format!(
        "palettegen=stats_mode={}",
        job.settings.palette_mode.ffmpeg_value()
    ));

    let args = vec![
        "-v".to_string(),
        FFMPEG_LOG_LEVEL.to_string(),
        "-i".to_string(),
        job.input_path.to_string_lossy().to_string(),
        "-vf".to_string(),
        filters.join(","),
        "-update".to_string(),
        "1".to_string(),
        "-y".to_string(),
        palette_file.to_string_lossy().to_string(),
    ];

    CommandPlan::new(&tools.ffmpeg, args, LogTag::FfmpegPalette)
}

/// Builds the paletted GIF render step.
pub fn gif_render_plan(
    job: &ConversionJob,
    tools: &ToolPaths,
    palette_file: &Path,
) -> CommandPlan {
    let chain = base_filters(&job.settings);
    let dither = job.settings.dither.ffmpeg_value();
    let filter_complex = if chain.is_empty() {
        format!("[0:v][1:v]paletteuse=dither={}", dither)
    } else {
        format!(
            "[0:v]{}[x];[x][1:v]paletteuse=dither={}",
            chain.join(","),
            dither
        )
    };

    let mut args = vec![
        "-v".to_string(),
        FFMPEG_LOG_LEVEL.to_string(),
        "-i".to_string(),
        job.input_path.to_string_lossy().to_string(),
        "-i".to_string(),
        palette_file.to_string_lossy().to_string(),
        "-filter_complex".to_string(),
        filter_complex,
    ];
    push_loop_and_output(&mut args, job);

    CommandPlan::new(&tools.ffmpeg, with_progress(args, job), LogTag::FfmpegRender)
}

/// Builds the direct WebP render step.
pub fn webp_render_plan(job: &ConversionJob, tools: &ToolPaths) -> CommandPlan {
    let mut filters = base_filters(&job.settings);
    filters.push("format=rgba".to_string());

    let mut args = vec![
        "-v".to_string(),
        FFMPEG_LOG_LEVEL.to_string(),
        "-i".to_string(),
        job.input_path.to_string_lossy().to_string(),
        "-vf".to_string(),
        filters.join(","),
    ];

    let webp = &job.settings.webp;
    if webp.lossless {
        args.extend(["-lossless".to_string(), "1".to_string()]);
    } else {
        args.extend([
            "-q:v".to_string(),
            webp.quality.to_string(),
            "-compression_level".to_string(),
            webp.compression.to_string(),
        ]);
    }
    push_loop_and_output(&mut args, job);

    CommandPlan::new(&tools.ffmpeg, with_progress(args, job), LogTag::FfmpegRender)
}

/// Builds the in-place gifsicle optimization step.
pub fn optimize_plan(job: &ConversionJob, tools: &ToolPaths) -> CommandPlan {
    let output = job.output_path.to_string_lossy().to_string();
    let loop_flag = if job.settings.loop_playback {
        "--loopcount=0"
    } else {
        "--no-loopcount"
    };

    let args = vec![
        "-O3".to_string(),
        loop_flag.to_string(),
        output.clone(),
        "-o".to_string(),
        output,
    ];

    CommandPlan::new(&tools.gifsicle, args, LogTag::GifsicleOptimize)
}

/// Filter stages shared by palette and render steps: fps, speed, scale/crop.
pub fn base_filters(settings: &EncodeSettings) -> Vec<String> {
    let mut filters = Vec::new();
    if let Some(fps) = settings.fps {
        filters.push(format!("fps={}", fps));
    }
    if settings.speed != 1.0 {
        filters.push(format!("setpts=PTS/{}", format_speed(settings.speed)));
    }
    push_scale_crop(&mut filters, settings.width, settings.height);
    filters
}

fn push_scale_crop(filters: &mut Vec<String>, width: Option<u32>, height: Option<u32>) {
    match (width, height) {
        (None, None) => {}
        (Some(w), Some(h)) => {
            // Scale to cover, then center crop to the exact size.
            filters.push(format!(
                "scale={}:{}:flags=lanczos:force_original_aspect_ratio=increase",
                w, h
            ));
            filters.push(format!("crop={w}:{h}:(iw-{w})/2:(ih-{h})/2", w = w, h = h));
        }
        (w, h) => {
            filters.push(format!(
                "scale={}:{}:flags=lanczos",
                dimension(w),
                dimension(h)
            ));
        }
    }
}

fn dimension(value: Option<u32>) -> String {
    value.map_or_else(|| "-1".to_string(), |v| v.to_string())
}

/// Keeps a trailing `.0` on whole multipliers (`2.0`, not `2`).
fn format_speed(speed: f64) -> String {
    format!("{:?}", speed)
}

fn push_loop_and_output(args: &mut Vec<String>, job: &ConversionJob) {
    let loop_value = if job.settings.loop_playback { "0" } else { "1" };
    args.extend([
        "-loop".to_string(),
        loop_value.to_string(),
        "-y".to_string(),
        job.output_path.to_string_lossy().to_string(),
    ]);
}

fn with_progress(args: Vec<String>, job: &ConversionJob) -> Vec<String> {
    if job.known_duration().is_none() {
        return args;
    }
    let mut full = Vec::with_capacity(args.len() + 2);
    full.push("-progress".to_string());
    full.push("pipe:1".to_string());
    full.extend(args);
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{DitherMode, PaletteMode, WebpOptions};
    use std::path::PathBuf;

    fn job() -> ConversionJob {
        ConversionJob::new("/tmp/input.mp4", "/tmp/out.gif")
            .with_settings(EncodeSettings {
                fps: Some(15),
                width: Some(480),
                height: None,
                dither: DitherMode::FloydSteinberg,
                palette_mode: PaletteMode::Diff,
                ..Default::default()
            })
            .with_duration(12.5)
    }

    fn tools() -> ToolPaths {
        ToolPaths::new("/usr/bin/ffmpeg", "/usr/bin/ffprobe", "/usr/bin/gifsicle")
    }

    fn palette() -> PathBuf {
        PathBuf::from("/tmp/palette.png")
    }

    #[test]
    fn test_gif_render_plan_with_filters() {
        let plan = gif_render_plan(&job(), &tools(), &palette());

        let flt = plan.arg_value("-filter_complex").unwrap();
        assert!(flt.contains("fps=15"));
        assert!(flt.contains("scale=480:-1:flags=lanczos"));
        assert!(!flt.contains("crop="));
        assert!(flt.contains("paletteuse=dither=floyd_steinberg"));
        assert_eq!(
            flt,
            "[0:v]fps=15,scale=480:-1:flags=lanczos[x];[x][1:v]paletteuse=dither=floyd_steinberg"
        );
        assert_eq!(plan.tag, LogTag::FfmpegRender);
        assert_eq!(plan.program, PathBuf::from("/usr/bin/ffmpeg"));
    }

    #[test]
    fn test_gif_render_plan_no_filters() {
        let mut job = job();
        job.settings.fps = None;
        job.settings.width = None;
        job.settings.height = None;

        let plan = gif_render_plan(&job, &tools(), &palette());
        assert_eq!(
            plan.arg_value("-filter_complex"),
            Some("[0:v][1:v]paletteuse=dither=floyd_steinberg")
        );
    }

    #[test]
    fn test_fixed_dimensions_scale_then_crop() {
        let mut job = job();
        job.settings.height = Some(480);

        let filters = base_filters(&job.settings);
        assert_eq!(
            filters,
            vec![
                "fps=15".to_string(),
                "scale=480:480:flags=lanczos:force_original_aspect_ratio=increase".to_string(),
                "crop=480:480:(iw-480)/2:(ih-480)/2".to_string(),
            ]
        );
    }

    #[test]
    fn test_height_only_scale() {
        let settings = EncodeSettings {
            height: Some(320),
            ..Default::default()
        };
        assert_eq!(base_filters(&settings), vec!["scale=-1:320:flags=lanczos"]);
    }

    #[test]
    fn test_speed_multiplier_filter() {
        let settings = EncodeSettings {
            speed: 2.0,
            ..Default::default()
        };
        assert_eq!(base_filters(&settings), vec!["setpts=PTS/2.0"]);

        let settings = EncodeSettings {
            speed: 1.5,
            ..Default::default()
        };
        assert_eq!(base_filters(&settings), vec!["setpts=PTS/1.5"]);
    }

    #[test]
    fn test_palette_plan() {
        let plan = palette_plan(&job(), &tools(), &palette());
        assert_eq!(plan.tag, LogTag::FfmpegPalette);
        assert_eq!(
            plan.arg_value("-vf"),
            Some("fps=15,scale=480:-1:flags=lanczos,format=rgb24,palettegen=stats_mode=diff")
        );
        assert_eq!(plan.args.last().map(String::as_str), Some("/tmp/palette.png"));
        // Palette step never reports progress.
        assert!(!plan.has_arg("-progress"));
    }

    #[test]
    fn test_render_plan_progress_only_with_duration() {
        let plan = gif_render_plan(&job(), &tools(), &palette());
        assert_eq!(&plan.args[..2], &["-progress".to_string(), "pipe:1".to_string()]);

        let mut job = job();
        job.total_duration = None;
        let plan = gif_render_plan(&job, &tools(), &palette());
        assert!(!plan.has_arg("-progress"));
    }

    #[test]
    fn test_loop_flag_applied_once() {
        let plan = gif_render_plan(&job(), &tools(), &palette());
        assert_eq!(plan.args.iter().filter(|a| *a == "-loop").count(), 1);
        assert_eq!(plan.arg_value("-loop"), Some("0"));

        let mut job = job();
        job.output_path = PathBuf::from("/tmp/out.webp");
        job.settings.loop_playback = false;
        let plan = webp_render_plan(&job, &tools());
        assert_eq!(plan.args.iter().filter(|a| *a == "-loop").count(), 1);
        assert_eq!(plan.arg_value("-loop"), Some("1"));
    }

    #[test]
    fn test_webp_plan_lossless() {
        let mut job = job();
        job.output_path = PathBuf::from("/tmp/out.webp");
        job.settings.webp = WebpOptions {
            lossless: true,
            ..Default::default()
        };

        let plan = webp_render_plan(&job, &tools());
        assert_eq!(plan.arg_value("-lossless"), Some("1"));
        assert!(!plan.has_arg("-q:v"));
        assert!(!plan.has_arg("-compression_level"));
        assert_eq!(
            plan.arg_value("-vf"),
            Some("fps=15,scale=480:-1:flags=lanczos,format=rgba")
        );
    }

    #[test]
    fn test_webp_plan_lossy_includes_quality() {
        let mut job = job();
        job.output_path = PathBuf::from("/tmp/out.webp");

        let plan = webp_render_plan(&job, &tools());
        assert!(!plan.has_arg("-lossless"));
        assert_eq!(plan.arg_value("-q:v"), Some("90"));
        assert_eq!(plan.arg_value("-compression_level"), Some("4"));
    }

    #[test]
    fn test_optimize_plan_loop() {
        let plan = optimize_plan(&job(), &tools());
        assert_eq!(plan.tag, LogTag::GifsicleOptimize);
        assert_eq!(
            plan.args,
            vec!["-O3", "--loopcount=0", "/tmp/out.gif", "-o", "/tmp/out.gif"]
        );

        let mut job = job();
        job.settings.loop_playback = false;
        let plan = optimize_plan(&job, &tools());
        assert!(plan.has_arg("--no-loopcount"));
        assert!(!plan.has_arg("--loopcount=0"));
    }

    #[test]
    fn test_builders_are_deterministic() {
        let a = gif_render_plan(&job(), &tools(), &palette());
        let b = gif_render_plan(&job(), &tools(), &palette());
        assert_eq!(a, b);
    }
}
