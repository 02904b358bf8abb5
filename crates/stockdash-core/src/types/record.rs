//! Cached per-symbol stock records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Bar, Symbol};

/// Price and volume fields derived from the latest fetched history.
///
/// Every field is optional; absence means "not yet fetched" or "unavailable".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Snapshot {
    pub current_price: Option<f64>,
    pub previous_price: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<f64>,
    pub average_volume: Option<f64>,
}

impl Snapshot {
    /// Derive the snapshot from a price history ordered oldest to newest.
    pub fn from_history(bars: &[Bar]) -> Self {
        let Some(last) = bars.last() else {
            return Self::default();
        };
        let previous = bars.len().checked_sub(2).map(|i| bars[i].close);

        let change = previous.map(|prev| last.close - prev);
        let change_percent = match (change, previous) {
            (Some(change), Some(prev)) if prev != 0.0 => Some(change / prev * 100.0),
            _ => None,
        };
        let average_volume = bars.iter().map(|b| b.volume).sum::<f64>() / bars.len() as f64;

        Self {
            current_price: Some(last.close),
            previous_price: previous,
            change,
            change_percent,
            volume: Some(last.volume),
            average_volume: Some(average_volume),
        }
        .retain_finite()
    }

    /// Replace NaN and infinite fields with `None`.
    pub fn retain_finite(self) -> Self {
        Self {
            current_price: finite(self.current_price),
            previous_price: finite(self.previous_price),
            change: finite(self.change),
            change_percent: finite(self.change_percent),
            volume: finite(self.volume),
            average_volume: finite(self.average_volume),
        }
    }
}

/// Fundamental figures reported by a history source, when it has them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Fundamentals {
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub cash_flow: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
}

impl Fundamentals {
    /// Replace NaN and infinite fields with `None`.
    pub fn retain_finite(self) -> Self {
        Self {
            revenue: finite(self.revenue),
            net_income: finite(self.net_income),
            cash_flow: finite(self.cash_flow),
            market_cap: finite(self.market_cap),
            pe_ratio: finite(self.pe_ratio),
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Everything currently known about one symbol.
///
/// Records are shared as `Arc<StockRecord>` and never mutated in place once
/// published; a successful fetch produces a new record that replaces the old
/// one wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct StockRecord {
    pub symbol: Symbol,
    pub company_name: String,
    pub snapshot: Snapshot,
    pub fundamentals: Fundamentals,
    pub price_history: Option<Vec<Bar>>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StockRecord {
    /// Create an empty, never-fetched record.
    pub fn new(symbol: Symbol, company_name: Option<&str>) -> Self {
        let company_name = company_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| symbol.default_company_name());

        Self {
            symbol,
            company_name,
            snapshot: Snapshot::default(),
            fundamentals: Fundamentals::default(),
            price_history: None,
            last_updated: None,
        }
    }

    /// True iff the record was fetched and `now - last_updated < ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.last_updated {
            Some(updated) => now - updated < ttl,
            None => false,
        }
    }

    /// Build the successor of this record after a successful fetch.
    pub fn refreshed(
        &self,
        snapshot: Snapshot,
        fundamentals: Fundamentals,
        history: Vec<Bar>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: self.symbol.clone(),
            company_name: self.company_name.clone(),
            snapshot,
            fundamentals,
            price_history: Some(history),
            last_updated: Some(now),
        }
    }

    /// Number of rows in the price history.
    pub fn history_len(&self) -> usize {
        self.price_history.as_ref().map_or(0, Vec::len)
    }
}
