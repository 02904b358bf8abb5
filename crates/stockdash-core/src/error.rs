//! Error types for the stock data cache.

use thiserror::Error;

/// Errors raised for invalid arguments or configuration.
///
/// Expected conditions (stale data, unknown symbols, failed fetches) are never
/// reported through this type; they surface as return values instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}

/// Errors reported by a history source.
///
/// Cloneable so that a single failed fetch can be delivered to every waiter
/// attached to it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("No data available for the requested range")]
    NoData,

    #[error("Fetch timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Data source error: {0}")]
    Source(String),
}
