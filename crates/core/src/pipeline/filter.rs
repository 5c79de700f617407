use regex_lite::Regex;
use tracing::warn;

/// Drops known-harmless encoder stderr lines.
#[derive(Debug, Clone, Default)]
pub struct StderrFilter {
    patterns: Vec<Regex>,
}

impl StderrFilter {
    /// Compiles `patterns` case-insensitively. Invalid patterns are skipped.
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(&format!("(?i){}", p)) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Ignoring invalid stderr pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_ignored(&self, line: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn test_default_patterns() {
        let filter = StderrFilter::new(&PipelineConfig::default().stderr_ignore);
        assert!(filter.is_ignored(
            "[swscaler @ 0x55d] Warning: input frame is not in sRGB, assuming sRGB"
        ));
        assert!(filter.is_ignored("    Last message repeated 12 times"));
        assert!(filter.is_ignored("INPUT FRAME IS NOT IN SRGB"));
        assert!(!filter.is_ignored("Last message repeated many times"));
        assert!(!filter.is_ignored("Error opening input file clip.mp4."));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let filter = StderrFilter::new(&["(broken".to_string(), "deprecated".to_string()]);
        assert!(filter.is_ignored("deprecated pixel format used"));
        assert!(!filter.is_ignored("(broken"));
    }
}
