//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stockdash")]
#[command(author, version, about = "Stock data cache and tag manager")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "stockdash.toml", env = "STOCKDASH_CONFIG")]
    pub config: PathBuf,

    /// Log level, overriding `logging.level` from the configuration
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format, overriding `logging.format`
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch (or reuse cached) price data and tag the symbols
    Fetch(FetchArgs),
    /// List tags with their cached data
    Tags,
    /// Toggle a tag's favorite flag
    Favorite(SymbolArgs),
    /// Remove a tag and its cached data
    Remove(SymbolArgs),
    /// Evict stale and excess cache records
    Cleanup,
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct FetchArgs {
    /// Symbols to fetch (comma-separated)
    #[arg(short = 'S', long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    /// Directory of CSV price files, overriding the configured one
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Run eviction before saving
    #[arg(long)]
    pub cleanup: bool,
}

#[derive(clap::Args)]
pub struct SymbolArgs {
    /// Ticker symbol
    pub symbol: String,
}
