//! Types for command plans.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifies which step and tool produced a plan or a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogTag {
    FfmpegPalette,
    FfmpegRender,
    GifsicleOptimize,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FfmpegPalette => "ffmpeg-palette",
            Self::FfmpegRender => "ffmpeg-render",
            Self::GifsicleOptimize => "gifsicle-optimize",
        }
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Step/tool tag for logs.
    pub tag: LogTag,
}

impl CommandPlan {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, tag: LogTag) -> Self {
        Self {
            program: program.into(),
            args,
            tag,
        }
    }

    /// Returns the value following `flag`, if the flag is present.
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Whether `arg` appears anywhere in the argument list.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Space-joined command line for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_tag_display() {
        assert_eq!(LogTag::FfmpegPalette.to_string(), "ffmpeg-palette");
        assert_eq!(LogTag::FfmpegRender.to_string(), "ffmpeg-render");
        assert_eq!(LogTag::GifsicleOptimize.to_string(), "gifsicle-optimize");
    }

    #[test]
    fn test_plan_helpers() {
        let plan = CommandPlan::new(
            "/usr/bin/gifsicle",
            vec!["-O3".into(), "in.gif".into(), "-o".into(), "in.gif".into()],
            LogTag::GifsicleOptimize,
        );
        assert_eq!(plan.arg_value("-o"), Some("in.gif"));
        assert_eq!(plan.arg_value("--missing"), None);
        assert!(plan.has_arg("-O3"));
        assert_eq!(plan.display(), "/usr/bin/gifsicle -O3 in.gif -o in.gif");
    }
}
