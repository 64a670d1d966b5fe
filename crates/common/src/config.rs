use std::fs;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Execution limits applied to every query unless the caller overrides them.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct QueryLimits {
    #[serde(default = "default_timeout_seconds")]
    pub query_timeout_seconds: u64,
    #[serde(default = "default_max_result_rows")]
    pub max_result_rows: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_queries: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            query_timeout_seconds: default_timeout_seconds(),
            max_result_rows: default_max_result_rows(),
            max_concurrent_queries: default_max_concurrent(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_result_rows() -> usize {
    10_000
}

fn default_max_concurrent() -> usize {
    10
}

/// Sizing for one cache domain.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CacheDomainSettings {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheDomainSettings {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

fn default_cache_capacity() -> usize {
    100
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

/// The three independent cache domains.
#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct CacheSettings {
    #[serde(default)]
    pub query_results: CacheDomainSettings,
    #[serde(default)]
    pub responses: CacheDomainSettings,
    #[serde(default)]
    pub completions: CacheDomainSettings,
}

/// Telemetry ring sizing and slow-query thresholds.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct MonitorSettings {
    #[serde(default = "default_slow_query_ms")]
    pub slow_query_ms: f64,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_max_stored_sql_len")]
    pub max_stored_sql_len: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            slow_query_ms: default_slow_query_ms(),
            history_capacity: default_history_capacity(),
            max_stored_sql_len: default_max_stored_sql_len(),
        }
    }
}

fn default_slow_query_ms() -> f64 {
    500.0
}

fn default_history_capacity() -> usize {
    100
}

fn default_max_stored_sql_len() -> usize {
    500
}

/// Logging output settings.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogSettings {
    /// When set, per-query JSONL records are appended under this directory.
    #[serde(default)]
    pub queries_log_dir: Option<String>,
}

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub limits: QueryLimits,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub logging: LogSettings,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).context(format!("Failed to read config file at {}", path))?;
        let mut config: AppConfig = serde_yaml::from_str(&content)
            .context(format!("Failed to parse config file at {}", path))?;

        // Environment variable overrides
        if let Ok(path) = std::env::var("KEEL_DATABASE_PATH") {
            config.database_path = Some(path);
        }
        if let Ok(secs) = std::env::var("KEEL_QUERY_TIMEOUT_SECONDS") {
            if let Ok(secs) = secs.parse() {
                config.limits.query_timeout_seconds = secs;
            }
        }
        if let Ok(max) = std::env::var("KEEL_MAX_CONCURRENT_QUERIES") {
            if let Ok(max) = max.parse() {
                config.limits.max_concurrent_queries = max;
            }
        }

        Ok(config)
    }
}
