//! Configuration module for rssagg.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, RssAggError};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL (`sqlite://...` or `postgres://...`).
    #[serde(default = "default_db_url")]
    pub url: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
}

fn default_db_url() -> String {
    "sqlite://data/rssagg.db".to_string()
}

fn default_db_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_db_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; stdout only when unset.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Feed ingestion configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Whether the background ingestion loop runs at all.
    #[serde(default = "default_ingest_enabled")]
    pub enabled: bool,
    /// Maximum number of feed-cycles in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Number of feeds selected per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seconds between ticks.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Dispatch a batch immediately at startup instead of after one interval.
    #[serde(default = "default_fetch_on_start")]
    pub fetch_on_start: bool,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Maximum number of candidates persisted per feed-cycle.
    #[serde(default = "default_max_items")]
    pub max_items_per_feed: usize,
    /// Maximum description length in characters.
    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,
    /// User agent sent with every fetch.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Allow loopback and private-network feed hosts.
    #[serde(default)]
    pub allow_private_hosts: bool,
    /// Seconds to wait for in-flight cycles on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_ingest_enabled() -> bool {
    true
}

fn default_concurrency() -> usize {
    10
}

fn default_batch_size() -> usize {
    10
}

fn default_interval() -> u64 {
    60
}

fn default_fetch_on_start() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_max_items() -> usize {
    100
}

fn default_max_description_length() -> usize {
    10000
}

fn default_user_agent() -> String {
    concat!("rssagg/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_shutdown_grace() -> u64 {
    10
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: default_ingest_enabled(),
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            interval_secs: default_interval(),
            fetch_on_start: default_fetch_on_start(),
            connect_timeout_secs: default_connect_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            max_items_per_feed: default_max_items(),
            max_description_length: default_max_description_length(),
            user_agent: default_user_agent(),
            allow_private_hosts: false,
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Ingestion configuration.
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RssAggError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RssAggError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `RSSAGG_DATABASE_URL`: database connection URL
    /// - `POSTGRES_URL`: fallback connection URL, postgres builds only
    /// - `RSSAGG_LOG_LEVEL`: log level
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let database_url = lookup("RSSAGG_DATABASE_URL").filter(|v| !v.is_empty());
        #[cfg(feature = "postgres")]
        let database_url =
            database_url.or_else(|| lookup("POSTGRES_URL").filter(|v| !v.is_empty()));
        if let Some(url) = database_url {
            self.database.url = url;
        }

        if let Some(level) = lookup("RSSAGG_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let ingest = &self.ingest;
        if ingest.concurrency == 0 {
            return Err(RssAggError::Validation(
                "ingest.concurrency must be at least 1".to_string(),
            ));
        }
        if ingest.batch_size == 0 {
            return Err(RssAggError::Validation(
                "ingest.batch_size must be at least 1".to_string(),
            ));
        }
        if ingest.interval_secs == 0 {
            return Err(RssAggError::Validation(
                "ingest.interval_secs must be at least 1".to_string(),
            ));
        }
        if ingest.total_timeout_secs == 0 {
            return Err(RssAggError::Validation(
                "ingest.total_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.database.url.is_empty() {
            return Err(RssAggError::Validation(
                "database.url must be set (config.toml or RSSAGG_DATABASE_URL)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
