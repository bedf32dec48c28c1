//! Configuration management.
//!
//! Settings come from, in increasing priority:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, `./ads-harvest.toml` or `<config_dir>/ads-harvest/config.toml`)
//! 3. Environment variables `ADS_HARVEST__<SECTION>__<KEY>`, e.g. `ADS_HARVEST__RETRY__MAX_RETRIES=5`
//!
//! The API token additionally falls back to `ADS_API_TOKEN`.

mod file_config;

pub use file_config::{default_config_path, find_config_file, save_config, CONFIG_FILE_NAME};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::SortSpec;
use crate::utils::RetryPolicy;

/// Environment variable holding the API token
pub const TOKEN_ENV_VAR: &str = "ADS_API_TOKEN";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "ADS_HARVEST";

/// Upper bound for `retry.base_delay_ms` (one minute)
pub const MAX_BASE_DELAY_MS: u64 = 60_000;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Provider endpoint and credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bearer token; never logged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.adsabs.harvard.edu/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Backoff settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay unit; attempt n waits `base * (2^n + jitter)`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            jitter: true,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

/// Paginated search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Rows per request, at most 2000
    #[serde(default = "default_page_cap")]
    pub page_cap: usize,

    /// Pause between pages
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Sort specification; bibcode is always appended as tiebreaker
    #[serde(default = "default_sort")]
    pub sort: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_cap: default_page_cap(),
            page_delay_ms: default_page_delay_ms(),
            sort: default_sort(),
        }
    }
}

fn default_page_cap() -> usize {
    crate::models::PAGE_CAP
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_sort() -> String {
    SortSpec::default().to_string()
}

/// Identifier batch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches of a bulk lookup
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Pause between batches of a catalogue download
    #[serde(default = "default_catalogue_delay_ms")]
    pub catalogue_delay_ms: u64,

    /// Save a checkpoint every N batches, 0 to only save at the end
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            catalogue_delay_ms: default_catalogue_delay_ms(),
            checkpoint_every: default_checkpoint_every(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}

fn default_batch_delay_ms() -> u64 {
    1000
}

fn default_catalogue_delay_ms() -> u64 {
    2000
}

fn default_checkpoint_every() -> usize {
    5
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Config {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .max_retries(self.retry.max_retries)
            .base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .jitter(self.retry.jitter)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.pagination.page_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch.batch_delay_ms)
    }

    pub fn catalogue_delay(&self) -> Duration {
        Duration::from_millis(self.batch.catalogue_delay_ms)
    }

    /// Parsed sort specification with the bibcode tiebreaker
    pub fn sort_spec(&self) -> Result<SortSpec, ConfigError> {
        SortSpec::parse(&self.pagination.sort)
            .map(SortSpec::with_tiebreak)
            .ok_or_else(|| {
                ConfigError::Invalid(format!("pagination.sort: cannot parse '{}'", self.pagination.sort))
            })
    }

    /// Whether a non-blank token is configured
    pub fn has_token(&self) -> bool {
        self.api.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Use `fallback` as the token when none is configured
    pub fn with_token_fallback(mut self, fallback: Option<String>) -> Self {
        if !self.has_token() {
            self.api.token = fallback.filter(|t| !t.trim().is_empty());
        }
        self
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.api.base_url).map_err(|e| {
            ConfigError::Invalid(format!("api.base_url '{}': {}", self.api.base_url, e))
        })?;
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be > 0".into()));
        }
        if self.batch.batch_size == 0 || self.batch.batch_size > crate::models::PAGE_CAP {
            return Err(ConfigError::Invalid(format!(
                "batch.batch_size must be between 1 and {}",
                crate::models::PAGE_CAP
            )));
        }
        if self.retry.base_delay_ms > MAX_BASE_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "retry.base_delay_ms must be at most {}",
                MAX_BASE_DELAY_MS
            )));
        }
        if self.pagination.page_cap == 0 || self.pagination.page_cap > crate::models::PAGE_CAP {
            return Err(ConfigError::Invalid(format!(
                "pagination.page_cap must be between 1 and {}",
                crate::models::PAGE_CAP
            )));
        }
        self.sort_spec()?;
        Ok(())
    }
}

/// Load configuration from an optional file plus environment overrides.
///
/// An explicit `path` must exist. Without one, the first file found by
/// [`find_config_file`] is used, if any.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(found) = find_config_file() {
                tracing::debug!("Using config file {}", found.display());
                builder = builder.add_source(config::File::from(found.as_path()).required(false));
            }
        }
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = settings.try_deserialize()?;
    let config = config.with_token_fallback(std::env::var(TOKEN_ENV_VAR).ok());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://api.adsabs.harvard.edu/v1");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.pagination.page_cap, 2000);
        assert_eq!(config.batch.batch_size, 50);
        assert_eq!(config.batch.checkpoint_every, 5);
        assert!(!config.has_token());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ads-harvest.toml");
        std::fs::write(
            &path,
            r#"
[api]
token = "file-token"
timeout_secs = 10

[retry]
max_retries = 5
base_delay_ms = 250

[pagination]
page_cap = 500
sort = "citation_count desc"

[batch]
batch_size = 20
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.api.token.as_deref(), Some("file-token"));
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_policy().max_attempts(), 6);
        assert_eq!(config.pagination.page_cap, 500);
        assert_eq!(
            config.sort_spec().unwrap().to_string(),
            "citation_count desc,bibcode desc"
        );
        assert_eq!(config.batch.batch_size, 20);
        assert_eq!(config.batch.batch_delay_ms, 1000);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_token_fallback() {
        let config = Config::default().with_token_fallback(Some("env-token".into()));
        assert_eq!(config.api.token.as_deref(), Some("env-token"));

        let mut configured = Config::default();
        configured.api.token = Some("file-token".into());
        let configured = configured.with_token_fallback(Some("env-token".into()));
        assert_eq!(configured.api.token.as_deref(), Some("file-token"));

        let blank = Config::default().with_token_fallback(Some("  ".into()));
        assert!(!blank.has_token());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.batch.batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.pagination.page_cap = 5000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.batch.batch_size = 2001;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.batch.batch_size = 2000;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.retry.base_delay_ms = u64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.retry.base_delay_ms = MAX_BASE_DELAY_MS;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.pagination.sort = "date sideways".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.api.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }
}
