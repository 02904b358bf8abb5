//! Size and staleness bound for the record store.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use stockdash_core::types::Symbol;
use tracing::{info, warn};

use crate::store::StockStore;

/// Symbols removed by one eviction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Records dropped because they were no longer fresh
    pub expired: Vec<Symbol>,
    /// Fresh records dropped to get under the size limit, oldest first
    pub overflow: Vec<Symbol>,
}

impl EvictionReport {
    /// Total number of records removed.
    pub fn removed(&self) -> usize {
        self.expired.len() + self.overflow.len()
    }
}

/// Removes expired records, then the least recently updated ones while the
/// store exceeds `max_entries`.
///
/// Runs only when invoked. Symbols with a fetch in flight are skipped in the
/// expiry pass and are the last candidates under size pressure; a fetch that
/// completes after its record was evicted simply re-inserts it.
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    ttl: Duration,
    max_entries: usize,
}

impl EvictionPolicy {
    /// Create a policy. `max_entries` is the store size bound.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { ttl, max_entries }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Evict against the current time.
    pub fn evict(&self, store: &StockStore, in_flight: &HashSet<Symbol>) -> EvictionReport {
        self.evict_at(store, in_flight, Utc::now())
    }

    /// Evict against an explicit clock reading.
    pub fn evict_at(
        &self,
        store: &StockStore,
        in_flight: &HashSet<Symbol>,
        now: DateTime<Utc>,
    ) -> EvictionReport {
        let report = store.with_records_mut(|records| {
            let mut report = EvictionReport::default();

            let mut expired: Vec<Symbol> = records
                .iter()
                .filter(|(symbol, record)| !record.is_fresh(now, self.ttl) && !in_flight.contains(*symbol))
                .map(|(symbol, _)| symbol.clone())
                .collect();
            expired.sort();
            for symbol in &expired {
                records.remove(symbol);
            }
            report.expired = expired;

            if records.len() > self.max_entries {
                // In-flight records sort after everything else; `None` sorts first.
                let mut candidates: Vec<(bool, Option<DateTime<Utc>>, Symbol)> = records
                    .iter()
                    .map(|(symbol, record)| (in_flight.contains(symbol), record.last_updated, symbol.clone()))
                    .collect();
                candidates.sort();

                let excess = records.len() - self.max_entries;
                for (busy, _, symbol) in candidates.into_iter().take(excess) {
                    if busy {
                        warn!(symbol = %symbol, "Evicting record with a fetch in flight");
                    }
                    records.remove(&symbol);
                    report.overflow.push(symbol);
                }
            }

            report
        });

        if report.removed() > 0 {
            info!(
                expired = report.expired.len(),
                overflow = report.overflow.len(),
                remaining = store.len(),
                "Evicted cache records"
            );
        }
        report
    }
}
