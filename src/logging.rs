//! Logging setup.

use stockdash_config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Pick the log level and format: CLI flags first, then the configuration.
pub fn resolve_logging(cli_level: Option<&str>, cli_json: bool, config: &LoggingConfig) -> (String, bool) {
    let level = cli_level.unwrap_or(config.level.as_str()).to_string();
    let json = cli_json || config.format.eq_ignore_ascii_case("json");
    (level, json)
}

/// Setup logging with the given level. `RUST_LOG` takes precedence.
pub fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
