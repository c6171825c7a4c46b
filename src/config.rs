//! Configuration file parser for `feed-digest.toml`.
//!
//! Every section uses `#[serde(default)]`, so only `[[categories]]` is
//! required in practice. Unknown keys are accepted but logged, since they are
//! usually typos.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::digest::{MergeOptions, PipelineConfig, Schedule, UndatedPolicy};
use crate::feed::FetchConfig;
use crate::output::category_file_stem;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// The file parsed but describes an unusable run.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// One digest group: a name and the feeds merged into it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    /// Category name. Any non-empty string; the output file name is derived
    /// from it by [`category_file_stem`].
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// `[fetch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub max_tries: u32,
    pub timeout_seconds: u64,
    /// Items considered per source feed
    pub feed_limit: usize,
    pub initial_backoff_ms: u64,
    /// Bound on simultaneous fetches per category; unset means unbounded.
    pub max_concurrency: Option<usize>,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_tries: 3,
            timeout_seconds: 15,
            feed_limit: 20,
            initial_backoff_ms: 2000,
            max_concurrency: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchSettings {
    pub fn to_fetch_config(&self) -> FetchConfig {
        FetchConfig {
            max_tries: self.max_tries,
            timeout: Duration::from_secs(self.timeout_seconds),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_concurrency: self.max_concurrency,
        }
    }
}

/// `[newsletter]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsletterSettings {
    /// Kept as a string so an unknown name is reported as a validation error
    /// naming the value, rather than a serde enum error.
    pub schedule: String,
    pub hide_author_in_title: bool,
    pub sort_by_date: bool,
    pub undated: UndatedPolicy,
}

impl Default for NewsletterSettings {
    fn default() -> Self {
        Self {
            schedule: Schedule::default().as_str().to_string(),
            hide_author_in_title: false,
            sort_by_date: false,
            undated: UndatedPolicy::default(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory the Atom files and failure report are written to.
    pub output_dir: PathBuf,
    pub fetch: FetchSettings,
    pub newsletter: NewsletterSettings,
    pub categories: Vec<Category>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            fetch: FetchSettings::default(),
            newsletter: NewsletterSettings::default(),
            categories: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 4] = ["output_dir", "fetch", "newsletter", "categories"];

    /// Load and validate configuration from a TOML file.
    ///
    /// - Missing file → `Err(ConfigError::NotFound)`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Valid TOML describing an unusable run → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            categories = config.categories.len(),
            schedule = %config.newsletter.schedule,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks everything that would make the run meaningless or unsafe.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = self.newsletter.schedule.parse::<Schedule>() {
            return Err(ConfigError::Invalid(e.to_string()));
        }
        if self.fetch.max_tries == 0 {
            return Err(ConfigError::Invalid(
                "fetch.max_tries must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "fetch.timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.fetch.initial_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "fetch.initial_backoff_ms must be at least 1".to_string(),
            ));
        }
        if self.fetch.max_concurrency == Some(0) {
            return Err(ConfigError::Invalid(
                "fetch.max_concurrency must be at least 1 when set".to_string(),
            ));
        }
        if self.categories.is_empty() {
            return Err(ConfigError::Invalid("no categories configured".to_string()));
        }

        let mut stems = HashSet::new();
        for category in &self.categories {
            if category.kind.trim().is_empty() {
                return Err(ConfigError::Invalid("category type must not be empty".to_string()));
            }
            // Distinct types can still collide once mapped to file names
            if !stems.insert(category_file_stem(&category.kind)) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate category type '{}'",
                    category.kind
                )));
            }
            if category.urls.is_empty() {
                tracing::warn!(category = %category.kind, "Category has no source URLs");
            }
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            fetch: self.fetch.to_fetch_config(),
            merge: MergeOptions {
                schedule: self.newsletter.schedule.clone(),
                feed_limit: self.fetch.feed_limit,
                undated: self.newsletter.undated,
                sort_by_date: self.newsletter.sort_by_date,
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
