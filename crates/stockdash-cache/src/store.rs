//! Symbol-keyed store of cached stock records.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use stockdash_core::types::{Bar, Fundamentals, Snapshot, StockRecord, Symbol};

/// Default freshness window in seconds.
pub const DEFAULT_TTL_SECS: i64 = 600;

type RecordMap = HashMap<Symbol, Arc<StockRecord>>;

/// Single source of truth for what is known about each symbol.
///
/// Records are published as `Arc<StockRecord>`; `update` swaps in a new
/// record under the write lock, so readers see either the old or the new
/// record and never a mix of both.
pub struct StockStore {
    records: RwLock<RecordMap>,
    ttl: Duration,
}

impl StockStore {
    /// Create a store with the given freshness window.
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Configured freshness window.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the existing record regardless of freshness, or insert an empty one.
    pub fn get_or_create(&self, symbol: &Symbol, company_name: Option<&str>) -> Arc<StockRecord> {
        if let Some(record) = self.get(symbol) {
            return record;
        }

        let mut records = self.write();
        records
            .entry(symbol.clone())
            .or_insert_with(|| Arc::new(StockRecord::new(symbol.clone(), company_name)))
            .clone()
    }

    /// Get the current record for a symbol.
    pub fn get(&self, symbol: &Symbol) -> Option<Arc<StockRecord>> {
        self.read().get(symbol).cloned()
    }

    /// Check freshness against the current time.
    pub fn is_fresh(&self, symbol: &Symbol, ttl: Duration) -> bool {
        self.is_fresh_at(symbol, ttl, Utc::now())
    }

    /// Check freshness against an explicit clock reading.
    pub fn is_fresh_at(&self, symbol: &Symbol, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.read()
            .get(symbol)
            .is_some_and(|record| record.is_fresh(now, ttl))
    }

    /// Replace a symbol's fetched data, stamping it with the current time.
    pub fn update(
        &self,
        symbol: &Symbol,
        snapshot: Snapshot,
        fundamentals: Fundamentals,
        history: Vec<Bar>,
    ) -> Arc<StockRecord> {
        self.update_at(symbol, snapshot, fundamentals, history, Utc::now())
    }

    /// Replace a symbol's fetched data, stamping it with `now`.
    ///
    /// A record evicted while its fetch was running is re-inserted.
    pub fn update_at(
        &self,
        symbol: &Symbol,
        snapshot: Snapshot,
        fundamentals: Fundamentals,
        history: Vec<Bar>,
        now: DateTime<Utc>,
    ) -> Arc<StockRecord> {
        let mut records = self.write();
        let updated = match records.get(symbol) {
            Some(current) => current.refreshed(snapshot, fundamentals, history, now),
            None => StockRecord::new(symbol.clone(), None).refreshed(
                snapshot,
                fundamentals,
                history,
                now,
            ),
        };
        let updated = Arc::new(updated);
        records.insert(symbol.clone(), updated.clone());
        updated
    }

    /// Insert a record as-is, replacing any existing one.
    pub fn insert(&self, record: StockRecord) -> Arc<StockRecord> {
        let record = Arc::new(record);
        self.write().insert(record.symbol.clone(), record.clone());
        record
    }

    /// Remove a symbol's record. Removing an unknown symbol is a no-op.
    pub fn remove(&self, symbol: &Symbol) -> Option<Arc<StockRecord>> {
        self.write().remove(symbol)
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// All cached symbols, sorted.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Snapshot of every record, sorted by symbol.
    pub fn records(&self) -> Vec<Arc<StockRecord>> {
        let mut records: Vec<Arc<StockRecord>> = self.read().values().cloned().collect();
        records.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        records
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Run `f` with exclusive access to the record map.
    pub(crate) fn with_records_mut<R>(&self, f: impl FnOnce(&mut RecordMap) -> R) -> R {
        f(&mut self.write())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RecordMap> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RecordMap> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StockStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECS))
    }
}
