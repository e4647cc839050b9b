//! Configuration for the documents directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatcherError};

/// Which files under a directory are ingestible, and how changes are watched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Path to the documents directory.
    pub path: PathBuf,

    /// Lowercase extensions of ingestible files, without the dot.
    pub extensions: Vec<String>,

    /// Patterns to exclude (glob patterns, matched against the full path).
    pub exclude_patterns: Vec<String>,

    /// Maximum depth to recurse (None = unlimited).
    pub max_depth: Option<usize>,

    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,

    /// Quiet period after the last event on a path before it is reported,
    /// in milliseconds. Gives copies time to finish.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::new("docs")
    }
}

impl WatchConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            extensions: ["pdf", "txt", "text", "md", "markdown"]
                .into_iter()
                .map(String::from)
                .collect(),
            exclude_patterns: Self::default_excludes(),
            max_depth: None,
            follow_symlinks: false,
            debounce_ms: 1_000,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Replace the ingestible extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    fn default_excludes() -> Vec<String> {
        vec![
            // Version control
            "**/.git/**".to_string(),
            // Editor and OS droppings
            "**/.*.swp".to_string(),
            "**/*~".to_string(),
            "**/.DS_Store".to_string(),
            "**/~$*".to_string(),
            // Partial downloads and temporary files
            "**/*.part".to_string(),
            "**/*.crdownload".to_string(),
            "**/*.tmp".to_string(),
        ]
    }

    /// Compile the config into a matcher, rejecting invalid patterns.
    pub fn matcher(&self) -> Result<FileMatcher> {
        let excludes = self
            .exclude_patterns
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern)
                    .map_err(|e| WatcherError::InvalidPattern(format!("{pattern}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FileMatcher {
            extensions: self
                .extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            excludes,
        })
    }
}

/// Decides whether a path is an ingestible file.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    extensions: Vec<String>,
    excludes: Vec<glob::Pattern>,
}

impl FileMatcher {
    /// Check if a path should be excluded.
    pub fn should_exclude(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.excludes.iter().any(|glob| glob.matches(&path_str))
    }

    pub fn has_ingestible_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    /// Whether `path` names a file that should be ingested. Only the name is
    /// inspected, so removed files still match.
    pub fn matches(&self, path: &Path) -> bool {
        self.has_ingestible_extension(path) && !self.should_exclude(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_watch_config_creation() {
        let config = WatchConfig::new("/home/user/documents")
            .with_extensions([".PDF", "md"])
            .with_max_depth(2)
            .with_debounce(Duration::from_millis(250));

        assert_eq!(config.path, Path::new("/home/user/documents"));
        assert_eq!(config.extensions, vec!["pdf", "md"]);
        assert_eq!(config.max_depth, Some(2));
        assert_eq!(config.debounce(), Duration::from_millis(250));
    }

    #[test]
    fn test_matcher_filters_extensions_and_excludes() {
        let matcher = WatchConfig::new("/docs")
            .exclude("**/drafts/**")
            .matcher()
            .unwrap();

        assert!(matcher.matches(Path::new("/docs/report.pdf")));
        assert!(matcher.matches(Path::new("/docs/notes/Readme.MD")));
        assert!(!matcher.matches(Path::new("/docs/photo.jpg")));
        assert!(!matcher.matches(Path::new("/docs/.git/HEAD")));
        assert!(!matcher.matches(Path::new("/docs/drafts/plan.md")));
        assert!(!matcher.matches(Path::new("/docs/big.pdf.part")));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result = WatchConfig::new("/docs").exclude("[unclosed").matcher();
        assert!(matches!(result, Err(WatcherError::InvalidPattern(_))));
    }
}
