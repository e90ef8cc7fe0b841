use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HistographError;

/// Top-level configuration loaded from `.histograph.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use histograph_core::HistographConfig;
///
/// let config = HistographConfig::default();
/// assert_eq!(config.mining.file_expansion_limit, 200);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistographConfig {
    /// Version-control adapter settings.
    #[serde(default)]
    pub vcs: VcsConfig,
    /// Mining pipeline settings.
    #[serde(default)]
    pub mining: MiningConfig,
    /// Analytics query defaults.
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl HistographConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HistographError::Io`] if the file cannot be read,
    /// [`HistographError::Toml`] if the content is not valid TOML, or
    /// [`HistographError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use histograph_core::HistographConfig;
    /// use std::path::Path;
    ///
    /// let config = HistographConfig::from_file(Path::new(".histograph.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, HistographError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`HistographError::Toml`] if parsing fails, or
    /// [`HistographError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use histograph_core::HistographConfig;
    ///
    /// let toml = r#"
    /// [mining]
    /// file_expansion_limit = 500
    /// "#;
    /// let config = HistographConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.mining.file_expansion_limit, 500);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, HistographError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the pipeline misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`HistographError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<(), HistographError> {
        if self.vcs.field_delimiter.is_empty() {
            return Err(HistographError::Config(
                "vcs.field_delimiter must not be empty".into(),
            ));
        }
        if self.vcs.max_output_bytes == 0 {
            return Err(HistographError::Config(
                "vcs.max_output_bytes must be positive".into(),
            ));
        }
        if self.mining.lookahead_lines == 0 {
            return Err(HistographError::Config(
                "mining.lookahead_lines must be positive".into(),
            ));
        }
        if self.mining.max_concurrent_queries == 0 {
            return Err(HistographError::Config(
                "mining.max_concurrent_queries must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.analytics.silo_threshold) {
            return Err(HistographError::Config(
                "analytics.silo_threshold must be within 0.0..=1.0".into(),
            ));
        }
        Ok(())
    }
}

/// Version-control adapter configuration.
///
/// # Examples
///
/// ```
/// use histograph_core::VcsConfig;
///
/// let config = VcsConfig::default();
/// assert_eq!(config.git_binary, "git");
/// assert_eq!(config.max_output_bytes, 50 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcsConfig {
    /// Name or path of the git executable (default: `"git"`).
    #[serde(default = "default_git_binary")]
    pub git_binary: String,
    /// Ceiling on captured stdout per query (default: 50MB).
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Field delimiter used in machine-parsable log formats (default: U+001F).
    #[serde(default = "default_field_delimiter")]
    pub field_delimiter: String,
}

fn default_git_binary() -> String {
    "git".into()
}

fn default_max_output_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_field_delimiter() -> String {
    "\u{1f}".into()
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            git_binary: default_git_binary(),
            max_output_bytes: default_max_output_bytes(),
            field_delimiter: default_field_delimiter(),
        }
    }
}

/// Mining pipeline configuration.
///
/// # Examples
///
/// ```
/// use histograph_core::MiningConfig;
///
/// let config = MiningConfig::default();
/// assert_eq!(config.lookahead_lines, 100);
/// assert_eq!(config.source_extensions, vec!["js", "ts", "jsx", "tsx"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Only the newest N commits are expanded into file touches (default: 200).
    #[serde(default = "default_file_expansion_limit")]
    pub file_expansion_limit: usize,
    /// Extensions whose files go through function extraction.
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
    /// Lines scanned past a declaration to find its closing brace (default: 100).
    #[serde(default = "default_lookahead_lines")]
    pub lookahead_lines: usize,
    /// Concurrent line-history queries per file (default: 8).
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    /// Progress emission cadence per stage.
    #[serde(default)]
    pub progress_every: ProgressCadence,
}

fn default_file_expansion_limit() -> usize {
    200
}

fn default_source_extensions() -> Vec<String> {
    ["js", "ts", "jsx", "tsx"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_lookahead_lines() -> usize {
    100
}

fn default_max_concurrent_queries() -> usize {
    8
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            file_expansion_limit: default_file_expansion_limit(),
            source_extensions: default_source_extensions(),
            lookahead_lines: default_lookahead_lines(),
            max_concurrent_queries: default_max_concurrent_queries(),
            progress_every: ProgressCadence::default(),
        }
    }
}

impl MiningConfig {
    /// Returns `true` if files with `extension` go through function extraction.
    ///
    /// # Examples
    ///
    /// ```
    /// use histograph_core::MiningConfig;
    ///
    /// let config = MiningConfig::default();
    /// assert!(config.is_source_extension("tsx"));
    /// assert!(config.is_source_extension("TS"));
    /// assert!(!config.is_source_extension("md"));
    /// ```
    pub fn is_source_extension(&self, extension: &str) -> bool {
        self.source_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

/// How often each stage reports progress, in processed items.
///
/// A value of zero is treated as one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressCadence {
    /// Commit-node stage (default: 100).
    #[serde(default = "default_commits_every")]
    pub commits: usize,
    /// File-touch stage (default: 20).
    #[serde(default = "default_files_every")]
    pub files: usize,
    /// Function-analysis stage (default: 10).
    #[serde(default = "default_analysis_every")]
    pub analysis: usize,
}

fn default_commits_every() -> usize {
    100
}

fn default_files_every() -> usize {
    20
}

fn default_analysis_every() -> usize {
    10
}

impl Default for ProgressCadence {
    fn default() -> Self {
        Self {
            commits: default_commits_every(),
            files: default_files_every(),
            analysis: default_analysis_every(),
        }
    }
}

/// Defaults for analytics queries.
///
/// # Examples
///
/// ```
/// use histograph_core::AnalyticsConfig;
///
/// let config = AnalyticsConfig::default();
/// assert_eq!(config.top_k, 10);
/// assert_eq!(config.co_change_limit, 20);
/// assert_eq!(config.evolution_months, 12);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Results returned by top-K queries (default: 10).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Co-change pairs returned (default: 20).
    #[serde(default = "default_co_change_limit")]
    pub co_change_limit: usize,
    /// Months covered by evolution queries (default: 12).
    #[serde(default = "default_evolution_months")]
    pub evolution_months: u32,
    /// Dominant-author share above which a file is a knowledge silo (default: 0.8).
    #[serde(default = "default_silo_threshold")]
    pub silo_threshold: f64,
}

fn default_top_k() -> usize {
    10
}

fn default_co_change_limit() -> usize {
    20
}

fn default_evolution_months() -> u32 {
    12
}

fn default_silo_threshold() -> f64 {
    0.8
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            co_change_limit: default_co_change_limit(),
            evolution_months: default_evolution_months(),
            silo_threshold: default_silo_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = HistographConfig::default();
        assert_eq!(config.vcs.git_binary, "git");
        assert_eq!(config.vcs.max_output_bytes, 52_428_800);
        assert_eq!(config.vcs.field_delimiter, "\u{1f}");
        assert_eq!(config.mining.file_expansion_limit, 200);
        assert_eq!(config.mining.lookahead_lines, 100);
        assert_eq!(config.mining.max_concurrent_queries, 8);
        assert_eq!(config.mining.progress_every.commits, 100);
        assert_eq!(config.mining.progress_every.files, 20);
        assert_eq!(config.mining.progress_every.analysis, 10);
        assert_eq!(config.analytics.top_k, 10);
        assert_eq!(config.analytics.co_change_limit, 20);
        assert_eq!(config.analytics.silo_threshold, 0.8);
    }

    #[test]
    fn parse_partial_toml() {
        let toml = r#"
[mining]
file_expansion_limit = 50
source_extensions = ["ts", "rs"]

[mining.progress_every]
files = 5
"#;
        let config = HistographConfig::from_toml(toml).unwrap();
        assert_eq!(config.mining.file_expansion_limit, 50);
        assert_eq!(config.mining.source_extensions, vec!["ts", "rs"]);
        assert_eq!(config.mining.progress_every.files, 5);
        assert_eq!(config.mining.progress_every.commits, 100);
        assert_eq!(config.mining.lookahead_lines, 100);
        assert_eq!(config.vcs.git_binary, "git");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = HistographConfig::from_toml("").unwrap();
        assert_eq!(config.mining.file_expansion_limit, 200);
        assert_eq!(config.analytics.evolution_months, 12);
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = HistographConfig::from_toml("{{invalid}}");
        assert!(matches!(result, Err(HistographError::Toml(_))));
    }

    #[test]
    fn empty_delimiter_is_rejected() {
        let toml = r#"
[vcs]
field_delimiter = ""
"#;
        let result = HistographConfig::from_toml(toml);
        assert!(matches!(result, Err(HistographError::Config(_))));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let toml = r#"
[mining]
max_concurrent_queries = 0
"#;
        assert!(HistographConfig::from_toml(toml).is_err());
    }

    #[test]
    fn silo_threshold_out_of_range_is_rejected() {
        let toml = r#"
[analytics]
silo_threshold = 1.5
"#;
        assert!(HistographConfig::from_toml(toml).is_err());
    }

    #[test]
    fn source_extension_match_ignores_case() {
        let config = MiningConfig::default();
        assert!(config.is_source_extension("JSX"));
        assert!(!config.is_source_extension("py"));
    }
}
