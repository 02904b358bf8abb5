//! Background fetch coordination with per-symbol de-duplication.

use chrono::Utc;
use futures::FutureExt;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use stockdash_core::error::FetchError;
use stockdash_core::traits::HistorySource;
use stockdash_core::types::{Bar, Fundamentals, Period, Snapshot, StockRecord, Symbol, Timeframe};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::store::StockStore;

/// Parameters of every fetch episode.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// History lookback requested from the source
    pub period: Period,
    /// Bar interval requested from the source
    pub interval: Timeframe,
    /// Upper bound on a single source call
    pub timeout: Duration,
    /// Re-check interval for `wait_or_timeout`
    pub poll_interval: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            period: Period::Year1,
            interval: Timeframe::Daily,
            timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Result delivered to every caller of `ensure_fresh`.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The cached record was fresh; no fetch was started.
    Cached(Arc<StockRecord>),
    /// A fetch completed and replaced the record.
    Fetched(Arc<StockRecord>),
    /// The fetch failed; `record` is the untouched, possibly stale record.
    Failed {
        record: Arc<StockRecord>,
        error: FetchError,
    },
}

impl FetchOutcome {
    /// Best available record for this outcome.
    pub fn record(&self) -> &Arc<StockRecord> {
        match self {
            FetchOutcome::Cached(record) | FetchOutcome::Fetched(record) => record,
            FetchOutcome::Failed { record, .. } => record,
        }
    }

    /// Consume the outcome, keeping its record.
    pub fn into_record(self) -> Arc<StockRecord> {
        match self {
            FetchOutcome::Cached(record) | FetchOutcome::Fetched(record) => record,
            FetchOutcome::Failed { record, .. } => record,
        }
    }

    /// The fetch error, if the outcome is a failure.
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, FetchOutcome::Failed { .. })
    }
}

type ReadyCallback = Box<dyn FnOnce(FetchOutcome) + Send + 'static>;

struct Waiter {
    on_ready: ReadyCallback,
    reply: oneshot::Sender<FetchOutcome>,
}

impl Waiter {
    fn complete(self, outcome: FetchOutcome) {
        let callback = self.on_ready;
        let delivered = outcome.clone();
        if std::panic::catch_unwind(AssertUnwindSafe(move || callback(delivered))).is_err() {
            error!(symbol = %outcome.record().symbol, "Fetch callback panicked");
        }
        // The caller may have dropped its handle.
        let _ = self.reply.send(outcome);
    }
}

/// Bounded-wait handle returned by `ensure_fresh`.
pub struct FetchHandle {
    symbol: Symbol,
    store: Arc<StockStore>,
    rx: oneshot::Receiver<FetchOutcome>,
}

impl FetchHandle {
    /// Symbol this handle waits on.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Wait up to `max_wait` for the fetch outcome.
    ///
    /// Returns `None` if the fetch has not finished in time.
    pub async fn outcome(self, max_wait: Duration) -> Option<FetchOutcome> {
        match tokio::time::timeout(max_wait, self.rx).await {
            Ok(Ok(outcome)) => Some(outcome),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Wait up to `max_wait`, then return the best available record.
    ///
    /// On timeout this is whatever the store currently holds, possibly stale
    /// or empty.
    pub async fn wait(self, max_wait: Duration) -> Arc<StockRecord> {
        let store = self.store.clone();
        let symbol = self.symbol.clone();
        match self.outcome(max_wait).await {
            Some(outcome) => outcome.into_record(),
            None => {
                debug!(symbol = %symbol, "Fetch still running, serving cached record");
                store.get_or_create(&symbol, None)
            }
        }
    }
}

struct Shared {
    store: Arc<StockStore>,
    source: Arc<dyn HistorySource>,
    settings: FetchSettings,
    in_flight: Mutex<HashMap<Symbol, Vec<Waiter>>>,
    completed: Notify,
}

impl Shared {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<Symbol, Vec<Waiter>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch(&self, symbol: &Symbol) -> Result<(Vec<Bar>, Fundamentals), FetchError> {
        let timeout = self.settings.timeout;
        let history = self
            .source
            .fetch_history(symbol, self.settings.period, self.settings.interval);

        let mut bars = tokio::time::timeout(timeout, history)
            .await
            .map_err(|_| FetchError::Timeout {
                secs: timeout.as_secs(),
            })??;

        let received = bars.len();
        bars.retain(Bar::is_finite);
        if bars.len() < received {
            warn!(symbol = %symbol, dropped = received - bars.len(), "Dropped bars with NaN or infinite values");
        }
        if bars.is_empty() {
            return Err(FetchError::NoData);
        }
        bars.sort_by_key(|b| b.date);

        let fundamentals = match tokio::time::timeout(timeout, self.source.fetch_fundamentals(symbol)).await {
            Ok(Ok(fundamentals)) => fundamentals.retain_finite(),
            Ok(Err(e)) => {
                warn!(symbol = %symbol, error = %e, "Fundamentals unavailable, keeping previous values");
                self.previous_fundamentals(symbol)
            }
            Err(_) => {
                warn!(symbol = %symbol, "Fundamentals fetch timed out, keeping previous values");
                self.previous_fundamentals(symbol)
            }
        };

        Ok((bars, fundamentals))
    }

    fn previous_fundamentals(&self, symbol: &Symbol) -> Fundamentals {
        self.store
            .get(symbol)
            .map(|record| record.fundamentals.clone())
            .unwrap_or_default()
    }
}

async fn run_fetch(shared: Arc<Shared>, symbol: Symbol) {
    info!(symbol = %symbol, source = shared.source.name(), "Fetching price history");

    let result = AssertUnwindSafe(shared.fetch(&symbol))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(FetchError::Source("history source panicked".to_string())));

    let outcome = match result {
        Ok((bars, fundamentals)) => {
            let rows = bars.len();
            let snapshot = Snapshot::from_history(&bars);
            let record = shared.store.update(&symbol, snapshot, fundamentals, bars);
            info!(symbol = %symbol, rows, "Price history updated");
            FetchOutcome::Fetched(record)
        }
        Err(error) => {
            warn!(symbol = %symbol, error = %error, "Fetch failed, data may be stale");
            let record = shared.store.get_or_create(&symbol, None);
            FetchOutcome::Failed { record, error }
        }
    };

    let waiters = shared.in_flight().remove(&symbol).unwrap_or_default();
    shared.completed.notify_waiters();

    debug!(symbol = %symbol, waiters = waiters.len(), "Notifying fetch waiters");
    for waiter in waiters {
        waiter.complete(outcome.clone());
    }
}

enum Decision {
    Hit(Arc<StockRecord>),
    Attached,
    Start,
}

/// Starts background fetches for stale symbols, at most one per symbol.
///
/// Callers that arrive while a fetch for the same symbol is running are
/// attached to it as additional waiters instead of starting a second fetch.
pub struct FetchCoordinator {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl FetchCoordinator {
    /// Create a coordinator spawning its fetch tasks on `runtime`.
    ///
    /// Holding the runtime handle lets non-async callers use `ensure_fresh`.
    pub fn new(
        store: Arc<StockStore>,
        source: Arc<dyn HistorySource>,
        settings: FetchSettings,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                source,
                settings,
                in_flight: Mutex::new(HashMap::new()),
                completed: Notify::new(),
            }),
            runtime,
        }
    }

    /// Store this coordinator writes into.
    pub fn store(&self) -> &Arc<StockStore> {
        &self.shared.store
    }

    /// Fetch settings.
    pub fn settings(&self) -> &FetchSettings {
        &self.shared.settings
    }

    /// Make sure `symbol` has fresh data, fetching in the background if needed.
    ///
    /// Never blocks on the fetch. On a cache hit `on_ready` runs before this
    /// returns; otherwise it runs on the fetch task once the outcome is known.
    pub fn ensure_fresh<F>(&self, symbol: &Symbol, company_name: Option<&str>, on_ready: F) -> FetchHandle
    where
        F: FnOnce(FetchOutcome) + Send + 'static,
    {
        let store = &self.shared.store;
        store.get_or_create(symbol, company_name);

        let (reply, rx) = oneshot::channel();
        let waiter = Waiter {
            on_ready: Box::new(on_ready),
            reply,
        };

        // Freshness is re-checked under the in-flight lock: a finishing fetch
        // updates the store before it clears its entry.
        let (decision, waiter) = {
            let mut in_flight = self.shared.in_flight();
            match in_flight.entry(symbol.clone()) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().push(waiter);
                    (Decision::Attached, None)
                }
                Entry::Vacant(entry) => match store.get(symbol) {
                    Some(record) if record.is_fresh(Utc::now(), store.ttl()) => {
                        (Decision::Hit(record), Some(waiter))
                    }
                    _ => {
                        entry.insert(vec![waiter]);
                        (Decision::Start, None)
                    }
                },
            }
        };

        match decision {
            Decision::Hit(record) => {
                debug!(symbol = %symbol, "Cache hit");
                let outcome = FetchOutcome::Cached(record);
                if let Some(waiter) = waiter {
                    waiter.complete(outcome);
                }
            }
            Decision::Attached => {
                debug!(symbol = %symbol, "Fetch already in flight, attaching waiter");
            }
            Decision::Start => {
                self.runtime.spawn(run_fetch(self.shared.clone(), symbol.clone()));
            }
        }

        FetchHandle {
            symbol: symbol.clone(),
            store: store.clone(),
            rx,
        }
    }

    /// Wait until `symbol` is fresh or `max_wait` elapses, whichever first.
    ///
    /// Wakes on every fetch completion and at least every poll interval. A
    /// fetch observed in flight that finishes without making the record fresh
    /// ends the wait early. Otherwise returns whatever is cached on timeout,
    /// possibly stale or empty.
    pub async fn wait_or_timeout(&self, symbol: &Symbol, max_wait: Duration) -> Arc<StockRecord> {
        let store = &self.shared.store;
        // No deadline when `max_wait` overflows the clock.
        let deadline = Instant::now().checked_add(max_wait);
        let mut saw_in_flight = false;

        loop {
            let notified = self.shared.completed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(record) = store.get(symbol) {
                if record.is_fresh(Utc::now(), store.ttl()) {
                    return record;
                }
            }

            // The store is updated before the in-flight entry is cleared, so
            // a finished fetch that left the record stale has failed.
            if self.is_in_flight(symbol) {
                saw_in_flight = true;
            } else if saw_in_flight {
                debug!(symbol = %symbol, "Fetch finished without fresh data");
                return store.get_or_create(symbol, None);
            }

            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    (deadline - now).min(self.shared.settings.poll_interval)
                }
                None => self.shared.settings.poll_interval,
            };
            let _ = tokio::time::timeout(slice, notified).await;
        }

        debug!(symbol = %symbol, "Timed out waiting for fresh data");
        store.get_or_create(symbol, None)
    }

    /// True if a fetch for `symbol` is running.
    pub fn is_in_flight(&self, symbol: &Symbol) -> bool {
        self.shared.in_flight().contains_key(symbol)
    }

    /// Symbols with a running fetch.
    pub fn in_flight(&self) -> HashSet<Symbol> {
        self.shared.in_flight().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as TimeDelta, TimeZone};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    enum Behavior {
        Succeed,
        Fail,
        Empty,
        Panic,
        Hang,
        NonFinite,
    }

    struct MockSource {
        calls: AtomicUsize,
        gate: Option<Notify>,
        behavior: Behavior,
    }

    impl MockSource {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: None,
                behavior,
            })
        }

        fn gated(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Some(Notify::new()),
                behavior,
            })
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HistorySource for MockSource {
        async fn fetch_history(
            &self,
            _symbol: &Symbol,
            _period: Period,
            _interval: Timeframe,
        ) -> Result<Vec<Bar>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.behavior {
                Behavior::Succeed => Ok(bars(&[100.0, 105.0])),
                Behavior::Fail => Err(FetchError::Connection("upstream unavailable".to_string())),
                Behavior::Empty => Ok(Vec::new()),
                Behavior::Panic => panic!("vendor library blew up"),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
                Behavior::NonFinite => {
                    let mut history = bars(&[100.0, 105.0, 110.0]);
                    history[1].volume = f64::NAN;
                    history[2].close = f64::INFINITY;
                    Ok(history)
                }
            }
        }

        async fn fetch_fundamentals(&self, _symbol: &Symbol) -> Result<Fundamentals, FetchError> {
            match self.behavior {
                Behavior::NonFinite => Ok(Fundamentals {
                    market_cap: Some(2.5e9),
                    pe_ratio: Some(f64::NAN),
                    ..Fundamentals::default()
                }),
                _ => Ok(Fundamentals::default()),
            }
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let date = Utc.with_ymd_and_hms(2024, 2, 1 + i as u32, 0, 0, 0).unwrap();
                Bar::new(date, close, close + 1.0, close - 1.0, close, 1_000.0)
            })
            .collect()
    }

    fn coordinator(source: Arc<MockSource>) -> FetchCoordinator {
        coordinator_with(source, FetchSettings::default())
    }

    fn coordinator_with(source: Arc<MockSource>, settings: FetchSettings) -> FetchCoordinator {
        FetchCoordinator::new(
            Arc::new(StockStore::default()),
            source,
            settings,
            Handle::current(),
        )
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cache_hit_skips_fetch() {
        let source = MockSource::new(Behavior::Succeed);
        let coordinator = coordinator(source.clone());
        let aapl = sym("AAPL");
        coordinator
            .store()
            .update(&aapl, Snapshot::default(), Fundamentals::default(), bars(&[1.0]));

        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let handle = coordinator.ensure_fresh(&aapl, None, move |outcome| {
            assert!(matches!(outcome, FetchOutcome::Cached(_)));
            flag.store(true, Ordering::SeqCst);
        });

        // Synchronous on a hit.
        assert!(called.load(Ordering::SeqCst));
        assert!(!coordinator.is_in_flight(&aapl));
        assert!(matches!(handle.outcome(WAIT).await, Some(FetchOutcome::Cached(_))));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_fetch() {
        let source = MockSource::gated(Behavior::Succeed);
        let coordinator = Arc::new(coordinator(source.clone()));
        let msft = sym("MSFT");
        let fired = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            let fired = fired.clone();
            let msft = msft.clone();
            tasks.push(tokio::spawn(async move {
                coordinator.ensure_fresh(&msft, Some("Microsoft"), move |outcome| {
                    assert!(outcome.is_success());
                    fired.fetch_add(1, Ordering::SeqCst);
                })
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        assert!(coordinator.is_in_flight(&msft));
        assert_eq!(coordinator.in_flight().len(), 1);

        source.release();
        for handle in handles {
            let record = handle.wait(WAIT).await;
            assert_eq!(record.snapshot.current_price, Some(105.0));
        }

        assert_eq!(source.calls(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 8);
        assert!(!coordinator.is_in_flight(&msft));
        assert_eq!(coordinator.store().get(&msft).unwrap().company_name, "Microsoft");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_fetch_keeps_stale_record() {
        let source = MockSource::new(Behavior::Fail);
        let coordinator = coordinator(source.clone());
        let ibm = sym("IBM");
        let stale_at = Utc::now() - TimeDelta::seconds(3600);
        let stale = coordinator.store().update_at(
            &ibm,
            Snapshot::from_history(&bars(&[50.0])),
            Fundamentals::default(),
            bars(&[50.0]),
            stale_at,
        );

        let outcome = coordinator.ensure_fresh(&ibm, None, |_| {}).outcome(WAIT).await.unwrap();
        assert!(matches!(outcome.error(), Some(FetchError::Connection(_))));
        assert_eq!(outcome.record().as_ref(), stale.as_ref());
        assert_eq!(coordinator.store().get(&ibm).unwrap().last_updated, Some(stale_at));
        assert!(!coordinator.is_in_flight(&ibm));

        // The in-flight marker is cleared, so the next request retries.
        coordinator.ensure_fresh(&ibm, None, |_| {}).outcome(WAIT).await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_expired_record_triggers_exactly_one_fetch() {
        let source = MockSource::new(Behavior::Succeed);
        let coordinator = coordinator(source.clone());
        let tsla = sym("TSLA");
        coordinator.store().update_at(
            &tsla,
            Snapshot::default(),
            Fundamentals::default(),
            bars(&[1.0]),
            Utc::now() - TimeDelta::seconds(603),
        );

        let outcome = coordinator.ensure_fresh(&tsla, None, |_| {}).outcome(WAIT).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Fetched(_)));
        assert_eq!(source.calls(), 1);

        let again = coordinator.ensure_fresh(&tsla, None, |_| {}).outcome(WAIT).await.unwrap();
        assert!(matches!(again, FetchOutcome::Cached(_)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_empty_history_is_a_failure() {
        let source = MockSource::new(Behavior::Empty);
        let coordinator = coordinator(source);
        let outcome = coordinator
            .ensure_fresh(&sym("XYZ"), None, |_| {})
            .outcome(WAIT)
            .await
            .unwrap();

        assert_eq!(outcome.error(), Some(&FetchError::NoData));
        assert_eq!(outcome.record().last_updated, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_source_clears_in_flight() {
        let source = MockSource::new(Behavior::Panic);
        let coordinator = coordinator(source);
        let qqq = sym("QQQ");

        let outcome = coordinator.ensure_fresh(&qqq, None, |_| {}).outcome(WAIT).await.unwrap();
        assert!(matches!(outcome.error(), Some(FetchError::Source(_))));
        assert!(!coordinator.is_in_flight(&qqq));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_source_timeout_reported_as_failure() {
        let source = MockSource::new(Behavior::Hang);
        let settings = FetchSettings {
            timeout: Duration::from_millis(50),
            ..FetchSettings::default()
        };
        let coordinator = coordinator_with(source, settings);

        let outcome = coordinator
            .ensure_fresh(&sym("SLOW"), None, |_| {})
            .outcome(WAIT)
            .await
            .unwrap();
        assert!(matches!(outcome.error(), Some(FetchError::Timeout { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_handle_wait_times_out_with_cached_record() {
        let source = MockSource::gated(Behavior::Succeed);
        let coordinator = coordinator(source.clone());
        let nflx = sym("NFLX");

        let handle = coordinator.ensure_fresh(&nflx, Some("Netflix"), |_| {});
        assert_eq!(handle.symbol(), &nflx);
        let record = handle.wait(Duration::from_millis(50)).await;

        assert_eq!(record.company_name, "Netflix");
        assert_eq!(record.last_updated, None);

        source.release();
        let fresh = coordinator.wait_or_timeout(&nflx, WAIT).await;
        assert!(fresh.last_updated.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_or_timeout_returns_cached_on_timeout() {
        let source = MockSource::gated(Behavior::Succeed);
        let coordinator = coordinator(source.clone());
        let amzn = sym("AMZN");
        coordinator.ensure_fresh(&amzn, None, |_| {});

        let started = std::time::Instant::now();
        let record = coordinator.wait_or_timeout(&amzn, Duration::from_millis(100)).await;

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(record.last_updated, None);
        source.release();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_or_timeout_wakes_on_completion() {
        let source = MockSource::gated(Behavior::Succeed);
        let coordinator = coordinator(source.clone());
        let meta = sym("META");
        coordinator.ensure_fresh(&meta, None, |_| {});

        let releaser = source.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            releaser.release();
        });

        let started = std::time::Instant::now();
        let record = coordinator.wait_or_timeout(&meta, WAIT).await;
        assert!(record.is_fresh(Utc::now(), coordinator.store().ttl()));
        assert!(started.elapsed() < WAIT);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_non_finite_values_never_reach_the_store() {
        let source = MockSource::new(Behavior::NonFinite);
        let coordinator = coordinator(source);
        let gme = sym("GME");

        let outcome = coordinator.ensure_fresh(&gme, None, |_| {}).outcome(WAIT).await.unwrap();
        assert!(outcome.is_success());

        let record = coordinator.store().get(&gme).unwrap();
        assert_eq!(record.history_len(), 1);
        assert!(record.price_history.as_ref().unwrap().iter().all(Bar::is_finite));
        assert_eq!(record.snapshot.current_price, Some(100.0));
        assert_eq!(record.fundamentals.market_cap, Some(2.5e9));
        assert_eq!(record.fundamentals.pe_ratio, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_or_timeout_returns_early_on_failure() {
        let source = MockSource::gated(Behavior::Fail);
        let coordinator = coordinator(source.clone());
        let intc = sym("INTC");
        coordinator.ensure_fresh(&intc, Some("Intel"), |_| {});

        let releaser = source.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            releaser.release();
        });

        let started = std::time::Instant::now();
        let record = coordinator.wait_or_timeout(&intc, Duration::from_secs(30)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(record.company_name, "Intel");
        assert_eq!(record.last_updated, None);
        assert!(!coordinator.is_in_flight(&intc));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_or_timeout_accepts_unbounded_wait() {
        let source = MockSource::gated(Behavior::Succeed);
        let coordinator = coordinator(source.clone());
        let pltr = sym("PLTR");
        coordinator.ensure_fresh(&pltr, None, |_| {});

        let releaser = source.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            releaser.release();
        });

        let record = tokio::time::timeout(WAIT, coordinator.wait_or_timeout(&pltr, Duration::MAX))
            .await
            .unwrap();
        assert!(record.is_fresh(Utc::now(), coordinator.store().ttl()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_callable_from_non_async_thread() {
        let source = MockSource::new(Behavior::Succeed);
        let coordinator = Arc::new(coordinator(source.clone()));
        let (tx, rx) = oneshot::channel();

        let ui = coordinator.clone();
        std::thread::spawn(move || {
            ui.ensure_fresh(&sym("ORCL"), None, move |outcome| {
                let _ = tx.send(outcome);
            });
        })
        .join()
        .unwrap();

        let outcome = tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
        assert!(matches!(outcome, FetchOutcome::Fetched(_)));
        assert_eq!(source.calls(), 1);
    }
}
