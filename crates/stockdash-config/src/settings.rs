//! Configuration structures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use stockdash_cache::{CacheSettings, FetchSettings};
use stockdash_core::error::CacheError;
use stockdash_core::types::{Period, Timeframe};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "stockdash".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness window in seconds
    pub ttl_secs: u64,
    /// Store size bound enforced on cleanup
    pub max_entries: usize,
    /// Snapshot file written on save
    pub snapshot_path: PathBuf,
    /// Re-check interval while waiting for fresh data
    pub poll_interval_ms: u64,
    /// Upper bound for blocking waits
    pub max_wait_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            max_entries: 50,
            snapshot_path: PathBuf::from("stock_cache.json"),
            poll_interval_ms: 500,
            max_wait_secs: 30,
        }
    }
}

/// History fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub period: String,
    pub interval: String,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            period: "1y".to_string(),
            interval: "1d".to_string(),
            timeout_secs: 20,
        }
    }
}

/// Local data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory of `<SYMBOL>.csv` price files
    pub csv_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from("data"),
        }
    }
}

impl AppConfig {
    /// Check value ranges and that period/interval parse.
    pub fn validate(&self) -> Result<(), CacheError> {
        let positive = [
            ("cache.ttl_secs", self.cache.ttl_secs),
            ("cache.max_entries", self.cache.max_entries as u64),
            ("cache.poll_interval_ms", self.cache.poll_interval_ms),
            ("cache.max_wait_secs", self.cache.max_wait_secs),
            ("fetch.timeout_secs", self.fetch.timeout_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(CacheError::InvalidConfig(format!("{} must be greater than zero", key)));
            }
        }
        if i64::try_from(self.cache.ttl_secs).is_err() {
            return Err(CacheError::InvalidConfig("cache.ttl_secs is too large".to_string()));
        }

        if !matches!(self.logging.format.to_lowercase().as_str(), "pretty" | "json") {
            return Err(CacheError::InvalidConfig(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        Period::from_str(&self.fetch.period)?;
        Timeframe::from_str(&self.fetch.interval)?;
        Ok(())
    }

    /// Validated settings for the cache service.
    pub fn cache_settings(&self) -> Result<CacheSettings, CacheError> {
        self.validate()?;

        Ok(CacheSettings {
            ttl: chrono::Duration::seconds(self.cache.ttl_secs as i64),
            max_entries: self.cache.max_entries,
            max_wait: Duration::from_secs(self.cache.max_wait_secs),
            fetch: FetchSettings {
                period: self.fetch.period.parse()?,
                interval: self.fetch.interval.parse()?,
                timeout: Duration::from_secs(self.fetch.timeout_secs),
                poll_interval: Duration::from_millis(self.cache.poll_interval_ms),
            },
        })
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
