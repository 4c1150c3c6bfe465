use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ChangelensError;

/// Top-level configuration loaded from `.changelens.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use changelens_core::ChangelensConfig;
///
/// let config = ChangelensConfig::default();
/// assert_eq!(config.history.concurrency, 8);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangelensConfig {
    /// History extraction settings.
    #[serde(default)]
    pub history: HistoryConfig,
    /// GitHub API settings.
    #[serde(default)]
    pub github: GithubConfig,
    /// Diff engine selection.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Report rendering settings.
    #[serde(default)]
    pub report: ReportConfig,
}

impl ChangelensConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelensError::Io`] if the file cannot be read, or
    /// [`ChangelensError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, ChangelensError> {
        if !path.exists() {
            return Err(ChangelensError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelensError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use changelens_core::ChangelensConfig;
    ///
    /// let toml = r#"
    /// [history]
    /// limit = 10
    /// "#;
    /// let config = ChangelensConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.history.limit, Some(10));
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, ChangelensError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load `.changelens.toml` from `dir` if present, otherwise defaults.
    pub fn discover(dir: &Path) -> Result<Self, ChangelensError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Default config file name searched in the working directory.
pub const CONFIG_FILE_NAME: &str = ".changelens.toml";

/// History extraction configuration.
///
/// # Examples
///
/// ```
/// use changelens_core::HistoryConfig;
///
/// let config = HistoryConfig::default();
/// assert!(config.limit.is_none());
/// assert_eq!(config.max_content_kb, Some(50_000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of revisions to process (newest first).
    pub limit: Option<usize>,
    /// Drop revisions older than this many days.
    pub since_days: Option<u64>,
    /// Fixed base revision; every revision is diffed against it.
    pub base: Option<String>,
    /// Concurrent remote fetches (default: 8).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Content budget in KB before older revisions are cut off (default: 50000).
    #[serde(default = "default_max_content_kb")]
    pub max_content_kb: Option<u64>,
    /// Capacity of the progress and error channels (default: 64).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_concurrency() -> usize {
    8
}

fn default_max_content_kb() -> Option<u64> {
    Some(50_000)
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: None,
            since_days: None,
            base: None,
            concurrency: default_concurrency(),
            max_content_kb: default_max_content_kb(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// GitHub API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API root (default: `https://api.github.com`).
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Personal access token. Falls back to `GH_TOKEN` / `GITHUB_TOKEN`.
    pub token: Option<String>,
    /// Commits requested per page (default: 100).
    #[serde(default = "default_per_page")]
    pub per_page: u8,
}

fn default_api_base() -> String {
    "https://api.github.com".into()
}

fn default_per_page() -> u8 {
    100
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token: None,
            per_page: default_per_page(),
        }
    }
}

impl GithubConfig {
    /// Token from config, then `GH_TOKEN`, then `GITHUB_TOKEN`.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("GH_TOKEN").ok())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.is_empty())
    }
}

/// Diff engine selection.
///
/// When `command` is set, the external program is invoked as
/// `command [args..] <old-file> <new-file>` and must print a JSON diff
/// result on stdout. Otherwise the built-in structural engine is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// External diff program.
    pub command: Option<String>,
    /// Extra arguments placed before the two document paths.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Report rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report title (default: `"API Changes Report"`).
    #[serde(default = "default_title")]
    pub title: String,
    /// Omit the generation timestamp for reproducible output.
    #[serde(default)]
    pub disable_timestamp: bool,
}

fn default_title() -> String {
    "API Changes Report".into()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            disable_timestamp: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = ChangelensConfig::default();
        assert!(config.history.limit.is_none());
        assert!(config.history.since_days.is_none());
        assert!(config.history.base.is_none());
        assert_eq!(config.history.concurrency, 8);
        assert_eq!(config.history.max_content_kb, Some(50_000));
        assert_eq!(config.history.channel_capacity, 64);
        assert_eq!(config.github.api_base, "https://api.github.com");
        assert_eq!(config.github.per_page, 100);
        assert!(config.engine.command.is_none());
        assert_eq!(config.report.title, "API Changes Report");
        assert!(!config.report.disable_timestamp);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[history]
limit = 5
since_days = 30
base = "abc123"
concurrency = 2

[github]
api_base = "https://ghe.example.com/api/v3"
token = "ghp_test"

[engine]
command = "oas-diff"
args = ["--json"]

[report]
title = "Pets API"
disable_timestamp = true
"#;
        let config = ChangelensConfig::from_toml(toml).unwrap();
        assert_eq!(config.history.limit, Some(5));
        assert_eq!(config.history.since_days, Some(30));
        assert_eq!(config.history.base.as_deref(), Some("abc123"));
        assert_eq!(config.history.concurrency, 2);
        assert_eq!(config.github.api_base, "https://ghe.example.com/api/v3");
        assert_eq!(config.github.resolve_token().as_deref(), Some("ghp_test"));
        assert_eq!(config.engine.command.as_deref(), Some("oas-diff"));
        assert_eq!(config.engine.args, vec!["--json"]);
        assert_eq!(config.report.title, "Pets API");
        assert!(config.report.disable_timestamp);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = ChangelensConfig::from_toml("").unwrap();
        assert_eq!(config.history.concurrency, 8);
        assert_eq!(config.report.title, "API Changes Report");
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = ChangelensConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ChangelensConfig::from_file(Path::new("/nonexistent/.changelens.toml"))
            .unwrap_err();
        assert!(matches!(err, ChangelensError::FileNotFound(_)));
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let config = ChangelensConfig::discover(Path::new("/nonexistent-dir")).unwrap();
        assert_eq!(config.history.concurrency, 8);
    }
}
