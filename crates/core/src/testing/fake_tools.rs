//! Shell-script stand-ins for ffmpeg, ffprobe and gifsicle.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use crate::job::ToolPaths;

const TICK_MS: u128 = 50;

/// A directory of fake encoder binaries.
///
/// Every invocation is appended to `invocations.log` as `<tool> <args...>`.
///
/// # Example
///
/// ```rust,ignore
/// use vidgif_core::testing::FakeTools;
///
/// let fakes = FakeTools::builder().frames(48).render_exit_code(1).build()?;
/// let (worker, events) = ConversionWorker::new(job, fakes.paths().clone(), config);
/// ```
pub struct FakeTools {
    dir: TempDir,
    paths: ToolPaths,
    log: PathBuf,
}

impl FakeTools {
    /// Fakes that succeed and render 24 frames.
    pub fn new() -> io::Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> FakeToolsBuilder {
        FakeToolsBuilder::default()
    }

    pub fn paths(&self) -> &ToolPaths {
        &self.paths
    }

    /// Directory holding the scripts. Removed on drop.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Recorded invocations, oldest first.
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Recorded invocations of one tool.
    pub fn invocations_of(&self, tool: &str) -> Vec<String> {
        let prefix = format!("{} ", tool);
        self.invocations()
            .into_iter()
            .filter(|line| line.starts_with(&prefix))
            .collect()
    }
}

/// Configures the behaviour of [`FakeTools`].
#[derive(Debug, Clone)]
pub struct FakeToolsBuilder {
    frames: u64,
    frame_us: u64,
    palette_exit: i32,
    render_exit: i32,
    optimize_exit: i32,
    render_delay: Duration,
    ignore_sigterm: bool,
    write_palette: bool,
    render_stderr: Vec<String>,
    probe_fps: String,
}

impl Default for FakeToolsBuilder {
    fn default() -> Self {
        Self {
            frames: 24,
            frame_us: 41_666,
            palette_exit: 0,
            render_exit: 0,
            optimize_exit: 0,
            render_delay: Duration::ZERO,
            ignore_sigterm: false,
            write_palette: true,
            render_stderr: Vec::new(),
            probe_fps: "24/1".to_string(),
        }
    }
}

impl FakeToolsBuilder {
    /// Frames reported by the render.
    pub fn frames(mut self, frames: u64) -> Self {
        self.frames = frames;
        self
    }

    /// Output time advanced per frame, in microseconds.
    pub fn frame_time_us(mut self, us: u64) -> Self {
        self.frame_us = us;
        self
    }

    pub fn palette_exit_code(mut self, code: i32) -> Self {
        self.palette_exit = code;
        self
    }

    pub fn render_exit_code(mut self, code: i32) -> Self {
        self.render_exit = code;
        self
    }

    pub fn optimize_exit_code(mut self, code: i32) -> Self {
        self.optimize_exit = code;
        self
    }

    /// Keeps the render alive this long after its last frame.
    pub fn render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }

    /// Makes the render ignore SIGTERM, so only a kill stops it.
    pub fn ignore_sigterm(mut self) -> Self {
        self.ignore_sigterm = true;
        self
    }

    /// Palette step succeeds without writing its file.
    pub fn skip_palette_file(mut self) -> Self {
        self.write_palette = false;
        self
    }

    /// Extra stderr line printed by the render.
    pub fn render_stderr(mut self, line: impl Into<String>) -> Self {
        self.render_stderr.push(line.into());
        self
    }

    /// `r_frame_rate` reported by the fake ffprobe.
    pub fn probe_fps(mut self, rate: impl Into<String>) -> Self {
        self.probe_fps = rate.into();
        self
    }

    pub fn build(self) -> io::Result<FakeTools> {
        let dir = tempfile::Builder::new().prefix("vidgif-fakes-").tempdir()?;
        let log = dir.path().join("invocations.log");

        let ffmpeg = dir.path().join("ffmpeg");
        let ffprobe = dir.path().join("ffprobe");
        let gifsicle = dir.path().join("gifsicle");
        write_script(&ffmpeg, &self.ffmpeg_script(&log))?;
        write_script(&ffprobe, &self.ffprobe_script(&log))?;
        write_script(&gifsicle, &self.gifsicle_script(&log))?;

        Ok(FakeTools {
            paths: ToolPaths::new(ffmpeg, ffprobe, gifsicle),
            dir,
            log,
        })
    }

    fn ffmpeg_script(&self, log: &Path) -> String {
        let mut s = String::from("#!/bin/sh\n");
        s.push_str(&record_line("ffmpeg", log));
        s.push_str("out=\"\"\nfor arg in \"$@\"; do out=\"$arg\"; done\n");

        s.push_str("case \"$*\" in\n*palettegen*)\n");
        if self.write_palette {
            s.push_str("  printf 'PNG' > \"$out\"\n");
        }
        s.push_str(&format!("  exit {}\n  ;;\nesac\n", self.palette_exit));

        if self.ignore_sigterm {
            s.push_str("trap '' TERM\n");
        }
        s.push_str(&format!(
            "i=1\nwhile [ \"$i\" -le {} ]; do\n  echo \"frame=$i\"\n  echo \"out_time_ms=$((i * {}))\"\n  echo \"progress=continue\"\n  i=$((i + 1))\ndone\n",
            self.frames, self.frame_us
        ));
        s.push_str("echo '[swscaler @ 0x5581] Warning: input frame is not in sRGB' >&2\n");
        s.push_str("echo '    Last message repeated 3 times' >&2\n");
        for line in &self.render_stderr {
            s.push_str(&format!("echo {} >&2\n", shell_quote(line)));
        }

        let ticks = self.render_delay.as_millis() / TICK_MS;
        if ticks > 0 {
            s.push_str(&format!(
                "n=0\nwhile [ \"$n\" -lt {} ]; do\n  sleep 0.05 </dev/null >/dev/null 2>&1\n  n=$((n + 1))\ndone\n",
                ticks
            ));
        }

        s.push_str("printf 'GIF89a' > \"$out\"\necho \"progress=end\"\n");
        s.push_str(&format!("exit {}\n", self.render_exit));
        s
    }

    fn ffprobe_script(&self, log: &Path) -> String {
        let mut s = String::from("#!/bin/sh\n");
        s.push_str(&record_line("ffprobe", log));
        s.push_str(&format!(
            "cat <<'JSON'\n{{\"format\": {{\"duration\": \"10.0\"}}, \"streams\": [{{\"codec_type\": \"video\", \"width\": 320, \"height\": 240, \"r_frame_rate\": \"{}\"}}]}}\nJSON\n",
            self.probe_fps
        ));
        s
    }

    fn gifsicle_script(&self, log: &Path) -> String {
        let mut s = String::from("#!/bin/sh\n");
        s.push_str(&record_line("gifsicle", log));
        s.push_str("out=\"\"\nfor arg in \"$@\"; do out=\"$arg\"; done\n");
        s.push_str("echo \"optimized $out\"\n");
        s.push_str(&format!("exit {}\n", self.optimize_exit));
        s
    }
}

fn record_line(tool: &str, log: &Path) -> String {
    format!(
        "echo \"{} $*\" >> {}\n",
        tool,
        shell_quote(&log.to_string_lossy())
    )
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

fn write_script(path: &Path, body: &str) -> io::Result<()> {
    fs::write(path, body)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}
