//! Screener configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetcher::{FetchOptions, RetryPolicy};
use crate::scoring::ScoringOptions;
use crate::table::Strategy;

/// Largest batch the provider accepts in one call.
pub const MAX_CHUNK_SIZE: usize = 100;
const DEFAULT_TOP_N: usize = 50;
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BASE_URL: &str = "https://cloud.iexapis.com/stable";
const DEFAULT_TOKEN_ENV: &str = "IEX_CLOUD_API_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    pub strategy: Strategy,
    /// Rows kept by the momentum screens.
    pub top_n: usize,
    pub fetch: FetchConfig,
    pub scoring: ScoringOptions,
    pub provider: ProviderConfig,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            top_n: DEFAULT_TOP_N,
            fetch: FetchConfig::default(),
            scoring: ScoringOptions::default(),
            provider: ProviderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub chunk_size: usize,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry is off unless `max_attempts` is raised above 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 250,
            multiplier: 2.0,
            max_backoff_ms: 4_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Environment variable holding the API token.
    pub token_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

impl ScreenerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ScreenerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fetch = &self.fetch;
        if fetch.chunk_size == 0 || fetch.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "fetch.chunk_size must be between 1 and {MAX_CHUNK_SIZE}, got {}",
                fetch.chunk_size
            )));
        }
        if fetch.concurrency == 0 {
            return Err(ConfigError::Invalid("fetch.concurrency must be at least 1".into()));
        }
        if fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be at least 1".into()));
        }
        if fetch.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("fetch.retry.max_attempts must be at least 1".into()));
        }
        if !(1.0..=10.0).contains(&fetch.retry.multiplier) {
            return Err(ConfigError::Invalid(format!(
                "fetch.retry.multiplier must be between 1 and 10, got {}",
                fetch.retry.multiplier
            )));
        }
        if self.top_n == 0 {
            return Err(ConfigError::Invalid("top_n must be at least 1".into()));
        }
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.base_url is empty".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        let retry = &self.fetch.retry;
        FetchOptions {
            concurrency: self.fetch.concurrency,
            timeout: self.timeout(),
            retry: RetryPolicy {
                max_attempts: retry.max_attempts,
                initial_backoff: Duration::from_millis(retry.initial_backoff_ms),
                multiplier: retry.multiplier,
                max_backoff: Duration::from_millis(retry.max_backoff_ms),
            },
        }
    }
}
