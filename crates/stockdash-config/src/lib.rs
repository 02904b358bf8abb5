//! Configuration management.

mod settings;

pub use settings::{AppConfig, AppSettings, CacheConfig, DataConfig, FetchConfig, LoggingConfig};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from an optional file and the environment.
///
/// Environment variables use the `STOCKDASH` prefix and `__` as the section
/// separator, e.g. `STOCKDASH__CACHE__TTL_SECS=300`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix("STOCKDASH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}
