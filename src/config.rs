//! Configuration for analysis thresholds, scan filters and journal storage.
//!
//! Configuration is stored in TOML format:
//!
//! ```toml
//! [analysis]
//! similarity_threshold = 0.85
//! min_pattern_siblings = 3
//! min_loose_files = 5
//! relatedness_threshold = 0.6
//! min_token_len = 3
//! hierarchy = true
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["**/node_modules"]
//! extensions = ["tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [journal]
//! directory = "/var/lib/foldersense"
//! ```
//!
//! Every section and key is optional; missing values fall back to the
//! defaults documented on each field.

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOCAL_CONFIG_NAME: &str = ".foldersense.toml";

/// Errors that can occur while loading or compiling configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub filters: FilterRules,
    #[serde(default)]
    pub journal: JournalConfig,
}

/// Thresholds and toggles for the suggestion analyzers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum blended name similarity for a merge suggestion.
    pub similarity_threshold: f64,
    /// Sibling groups smaller than this are skipped by the pattern detector.
    pub min_pattern_siblings: usize,
    /// Loose-file grouping only triggers with at least this many root files.
    pub min_loose_files: usize,
    /// Minimum edge weight kept in the relatedness graph.
    pub relatedness_threshold: f64,
    /// Name tokens shorter than this are ignored when relating folders.
    pub min_token_len: usize,
    pub similarity: bool,
    pub patterns: bool,
    pub hierarchy: bool,
    pub loose_files: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            min_pattern_siblings: 3,
            min_loose_files: 5,
            relatedness_threshold: 0.6,
            min_token_len: 3,
            similarity: true,
            patterns: true,
            hierarchy: true,
            loose_files: true,
        }
    }
}

impl AnalysisConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("relatedness_threshold", self.relatedness_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ConfigInvalid(format!(
                    "analysis.{} must be within [0, 1], got {}",
                    key, value
                )));
            }
        }
        for (key, value) in [
            ("min_pattern_siblings", self.min_pattern_siblings),
            ("min_loose_files", self.min_loose_files),
            ("min_token_len", self.min_token_len),
        ] {
            if value == 0 {
                return Err(ConfigError::ConfigInvalid(format!(
                    "analysis.{} must be at least 1",
                    key
                )));
            }
        }
        Ok(())
    }
}

/// Where change journals are persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Journal directory. Defaults to `<data_local_dir>/foldersense/journals`.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Rules deciding which entries the scanner keeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden entries (starting with "."). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist that overrides every exclude rule.
    #[serde(default)]
    pub include: IncludeRules,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact entry names (e.g. ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the path relative to the scanned root.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions, case-insensitive. Never applied to directories.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the entry name.
    #[serde(default)]
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl AppConfig {
    /// Load configuration, falling back to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path` when provided
    /// 2. `.foldersense.toml` in the current directory
    /// 3. `<config_dir>/foldersense/config.toml`
    /// 4. built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file is missing, or if any file
    /// that is found cannot be parsed or holds out-of-range values.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("foldersense").join("config.toml");
            if user_config.exists() {
                return Self::load_from_file(&user_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.analysis.validate()?;
        Ok(config)
    }

    /// Compile the scan filters into matchers.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Pre-compiled filter rules.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| Pattern::new(p).map_err(|_| ConfigError::InvalidGlobPattern(p.clone())))
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Whether the scanner should keep an entry.
    ///
    /// `relative` is the entry's path relative to the scanned root. Checks run
    /// in order with early exit: include patterns, hidden entries, exact
    /// names, extensions (files only), glob patterns, regexes.
    pub fn should_include(&self, relative: &Path, is_dir: bool) -> bool {
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.include_patterns.iter().any(|p| p.matches_path(relative)) {
            return true;
        }

        if !self.enable_hidden_files && name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(name.as_ref()) {
            return false;
        }

        if !is_dir
            && let Some(ext) = relative.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self.exclude_patterns.iter().any(|p| p.matches_path(relative)) {
            return false;
        }

        !self.exclude_regexes.iter().any(|r| r.is_match(&name))
    }
}
