//! History source trait definitions.

use crate::error::FetchError;
use crate::types::{Bar, Fundamentals, Period, Symbol, Timeframe};
use async_trait::async_trait;

/// Upstream provider of price histories.
///
/// The fetch coordinator calls `fetch_history` exactly once per fetch episode
/// and never concurrently for the same symbol.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch the price history for a symbol.
    ///
    /// # Arguments
    /// * `symbol` - The symbol to fetch
    /// * `period` - How far back the history should reach
    /// * `interval` - The bar interval
    ///
    /// # Returns
    /// A vector of bars ordered from oldest to newest
    async fn fetch_history(
        &self,
        symbol: &Symbol,
        period: Period,
        interval: Timeframe,
    ) -> Result<Vec<Bar>, FetchError>;

    /// Fetch fundamental figures for a symbol.
    ///
    /// Sources without fundamentals keep the default, which reports none.
    async fn fetch_fundamentals(&self, _symbol: &Symbol) -> Result<Fundamentals, FetchError> {
        Ok(Fundamentals::default())
    }

    /// Get the source name.
    fn name(&self) -> &str;
}
