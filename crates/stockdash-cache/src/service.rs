//! Process-wide cache service.

use chrono::Duration;
use std::sync::Arc;
use stockdash_core::traits::HistorySource;
use stockdash_core::types::{StockRecord, Symbol};
use tokio::runtime::Handle;

use crate::coordinator::{FetchCoordinator, FetchHandle, FetchOutcome, FetchSettings};
use crate::eviction::{EvictionPolicy, EvictionReport};
use crate::store::{StockStore, DEFAULT_TTL_SECS};

/// Settings for a `CacheService`.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Freshness window
    pub ttl: Duration,
    /// Store size bound enforced by `cleanup`
    pub max_entries: usize,
    /// Default bound for blocking waits
    pub max_wait: std::time::Duration,
    pub fetch: FetchSettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            max_entries: 50,
            max_wait: std::time::Duration::from_secs(30),
            fetch: FetchSettings::default(),
        }
    }
}

/// Owns the store, the fetch coordinator and the eviction policy.
///
/// Constructed once at startup and shared by handle with every consumer.
pub struct CacheService {
    store: Arc<StockStore>,
    coordinator: FetchCoordinator,
    eviction: EvictionPolicy,
    max_wait: std::time::Duration,
}

impl CacheService {
    /// Create a service fetching from `source` on `runtime`.
    pub fn new(settings: CacheSettings, source: Arc<dyn HistorySource>, runtime: Handle) -> Self {
        let store = Arc::new(StockStore::new(settings.ttl));
        let coordinator = FetchCoordinator::new(store.clone(), source, settings.fetch, runtime);
        Self {
            store,
            coordinator,
            eviction: EvictionPolicy::new(settings.ttl, settings.max_entries),
            max_wait: settings.max_wait,
        }
    }

    pub fn store(&self) -> &Arc<StockStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    pub fn eviction(&self) -> &EvictionPolicy {
        &self.eviction
    }

    /// Default bound for `wait`.
    pub fn max_wait(&self) -> std::time::Duration {
        self.max_wait
    }

    /// See [`FetchCoordinator::ensure_fresh`].
    pub fn ensure_fresh<F>(&self, symbol: &Symbol, company_name: Option<&str>, on_ready: F) -> FetchHandle
    where
        F: FnOnce(FetchOutcome) + Send + 'static,
    {
        self.coordinator.ensure_fresh(symbol, company_name, on_ready)
    }

    /// Wait for fresh data using the configured bound.
    pub async fn wait(&self, symbol: &Symbol) -> Arc<StockRecord> {
        self.coordinator.wait_or_timeout(symbol, self.max_wait).await
    }

    /// See [`FetchCoordinator::wait_or_timeout`].
    pub async fn wait_or_timeout(&self, symbol: &Symbol, max_wait: std::time::Duration) -> Arc<StockRecord> {
        self.coordinator.wait_or_timeout(symbol, max_wait).await
    }

    /// Run the eviction policy, sparing symbols with a fetch in flight.
    pub fn cleanup(&self) -> EvictionReport {
        let in_flight = self.coordinator.in_flight();
        self.eviction.evict(&self.store, &in_flight)
    }
}
