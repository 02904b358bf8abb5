//! JSON snapshot of the record store plus tag favorites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use stockdash_cache::StockStore;
use stockdash_core::types::{Bar, Fundamentals, Snapshot, StockRecord, Symbol};
use stockdash_tags::TagRegistry;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::StorageError;

/// On-disk form of one symbol's entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    pub company_name: String,
    #[serde(flatten)]
    pub snapshot: Snapshot,
    #[serde(flatten)]
    pub fundamentals: Fundamentals,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub price_history: Option<Vec<Bar>>,
    #[serde(default)]
    pub is_favorited: bool,
}

impl PersistedRecord {
    /// NaN and infinity have no JSON form; such values are dropped so the
    /// file always loads back.
    fn from_record(record: &StockRecord, is_favorited: bool) -> Self {
        Self {
            company_name: record.company_name.clone(),
            snapshot: record.snapshot.clone().retain_finite(),
            fundamentals: record.fundamentals.clone().retain_finite(),
            last_updated: record.last_updated,
            price_history: record
                .price_history
                .as_ref()
                .map(|bars| bars.iter().copied().filter(Bar::is_finite).collect()),
            is_favorited,
        }
    }

    fn into_record(self, symbol: Symbol) -> StockRecord {
        StockRecord {
            symbol,
            company_name: self.company_name,
            snapshot: self.snapshot,
            fundamentals: self.fundamentals,
            price_history: self.price_history,
            last_updated: self.last_updated,
        }
    }
}

/// State read back from a snapshot file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoredState {
    /// Restored records, sorted by symbol
    pub records: Vec<StockRecord>,
    pub favorites: BTreeSet<Symbol>,
}

impl RestoredState {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert every restored record into `store`.
    ///
    /// Tags are not recreated; see [`restore_tags`].
    pub fn apply(&self, store: &StockStore) {
        for record in &self.records {
            store.insert(record.clone());
        }
    }
}

/// Recreate one tag per restored record, keeping favorite flags.
///
/// No tag is focused afterwards.
pub fn restore_tags(state: &RestoredState, registry: &TagRegistry) {
    registry.restore(state.records.iter().map(|record| {
        (
            &record.symbol,
            record.company_name.as_str(),
            state.favorites.contains(&record.symbol),
        )
    }));
}

/// Snapshot file keyed by symbol.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every record and every tag's favorite flag, replacing the file.
    ///
    /// Tags without a cached record are written as empty records so their
    /// favorite flag survives. Returns the number of entries written.
    pub fn save(&self, store: &StockStore, registry: &TagRegistry) -> Result<usize, StorageError> {
        let favorites: BTreeSet<Symbol> = registry.list_favorited().into_iter().collect();

        let mut entries: BTreeMap<Symbol, PersistedRecord> = store
            .records()
            .iter()
            .map(|record| {
                let favorited = favorites.contains(&record.symbol);
                (record.symbol.clone(), PersistedRecord::from_record(record, favorited))
            })
            .collect();

        for tag in registry.list_active() {
            entries.entry(tag.symbol.clone()).or_insert_with(|| {
                let empty = StockRecord::new(tag.symbol.clone(), Some(tag.company_name.as_str()));
                PersistedRecord::from_record(&empty, tag.is_favorited)
            });
        }

        let json = serde_json::to_vec_pretty(&entries)?;
        self.write_atomically(&json)?;

        info!(path = %self.path.display(), entries = entries.len(), "Saved cache snapshot");
        Ok(entries.len())
    }

    /// Read the snapshot back.
    ///
    /// A missing file yields empty state. An unreadable or malformed file is
    /// logged and also yields empty state.
    pub fn load(&self) -> RestoredState {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache snapshot, starting empty");
                return RestoredState::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read cache snapshot, starting empty");
                return RestoredState::default();
            }
        };

        let entries: BTreeMap<Symbol, PersistedRecord> = match serde_json::from_str(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt cache snapshot, starting empty");
                return RestoredState::default();
            }
        };

        let mut state = RestoredState::default();
        for (symbol, entry) in entries {
            if entry.is_favorited {
                state.favorites.insert(symbol.clone());
            }
            state.records.push(entry.into_record(symbol));
        }

        info!(path = %self.path.display(), records = state.records.len(), "Loaded cache snapshot");
        state
    }

    fn write_atomically(&self, bytes: &[u8]) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn history() -> Vec<Bar> {
        (0..5)
            .map(|i| {
                let date = Utc.with_ymd_and_hms(2024, 4, 1 + i, 14, 30, 0).unwrap();
                let base = 0.1 + 0.2 + f64::from(i) / 3.0;
                Bar::new(date, base, base * 1.01, base * 0.99, base + 1e-9, 12_345.678 * f64::from(i))
            })
            .collect()
    }

    fn populated() -> (StockStore, TagRegistry) {
        let store = StockStore::default();
        let registry = TagRegistry::new();
        let bars = history();
        let fundamentals = Fundamentals {
            revenue: Some(383_285_000_000.0),
            net_income: Some(96_995_000_000.0),
            cash_flow: None,
            market_cap: Some(2.9e12),
            pe_ratio: Some(29.123456789012345),
        };

        store.get_or_create(&sym("AAPL"), Some("Apple Inc."));
        store.update_at(
            &sym("AAPL"),
            Snapshot::from_history(&bars),
            fundamentals,
            bars,
            Utc.with_ymd_and_hms(2024, 4, 6, 9, 0, 0).unwrap() + chrono::Duration::nanoseconds(123_456_789),
        );
        store.get_or_create(&sym("MSFT"), Some("Microsoft"));

        registry.add(&sym("AAPL"), Some("Apple Inc."));
        registry.add(&sym("MSFT"), Some("Microsoft"));
        registry.add(&sym("NVDA"), Some("Nvidia"));
        registry.toggle_favorite(&sym("AAPL"));
        registry.toggle_favorite(&sym("NVDA"));

        (store, registry)
    }

    #[test]
    fn test_round_trip_preserves_records_and_favorites() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("cache.json"));
        let (store, registry) = populated();

        assert_eq!(file.save(&store, &registry).unwrap(), 3);
        let restored = file.load();

        let original: Vec<StockRecord> = store.records().iter().map(|r| r.as_ref().clone()).collect();
        assert_eq!(&restored.records[..2], original.as_slice());
        assert_eq!(restored.records[2].symbol, sym("NVDA"));
        assert_eq!(restored.records[2].company_name, "Nvidia");
        assert_eq!(restored.favorites, BTreeSet::from([sym("AAPL"), sym("NVDA")]));
    }

    #[test]
    fn test_non_finite_values_do_not_corrupt_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("cache.json"));
        let store = StockStore::default();
        let registry = TagRegistry::new();

        let mut bars = history();
        bars[2].volume = f64::NAN;
        let snapshot = Snapshot {
            change_percent: Some(f64::INFINITY),
            ..Snapshot::from_history(&bars)
        };
        store.update(&sym("AAPL"), snapshot, Fundamentals::default(), bars);
        store.update(&sym("GOOD"), Snapshot::from_history(&history()), Fundamentals::default(), history());
        registry.add(&sym("AAPL"), None);
        registry.add(&sym("GOOD"), None);
        registry.toggle_favorite(&sym("GOOD"));

        assert_eq!(file.save(&store, &registry).unwrap(), 2);
        let restored = file.load();

        assert_eq!(restored.records.len(), 2);
        assert_eq!(restored.favorites, BTreeSet::from([sym("GOOD")]));
        let aapl = &restored.records[0];
        assert_eq!(aapl.history_len(), 4);
        assert!(aapl.price_history.as_ref().unwrap().iter().all(Bar::is_finite));
        assert_eq!(aapl.snapshot.change_percent, None);
        assert_eq!(restored.records[1], store.get(&sym("GOOD")).unwrap().as_ref().clone());
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("cache.json"));
        let (store, registry) = populated();
        file.save(&store, &registry).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(file.path()).unwrap()).unwrap();
        let aapl = &json["AAPL"];

        assert_eq!(aapl["companyName"], "Apple Inc.");
        assert_eq!(aapl["isFavorited"], true);
        assert!(aapl["currentPrice"].is_f64());
        assert!(aapl["marketCap"].is_f64());
        assert!(aapl["lastUpdated"].is_string());
        assert_eq!(aapl["priceHistory"].as_array().unwrap().len(), 5);
        assert!(aapl["priceHistory"][0]["date"].is_string());
        assert_eq!(json["MSFT"]["isFavorited"], false);
        assert!(json["MSFT"]["priceHistory"].is_null());
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("absent.json"));

        assert!(file.load().is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ \"AAPL\": { \"companyName\": ").unwrap();

        let restored = SnapshotFile::new(&path).load();
        assert!(restored.is_empty());
        assert!(restored.favorites.is_empty());
    }

    #[test]
    fn test_save_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("nested").join("cache.json"));
        let (store, registry) = populated();
        file.save(&store, &registry).unwrap();

        store.clear();
        registry.clear_all();
        registry.add(&sym("IBM"), None);
        assert_eq!(file.save(&store, &registry).unwrap(), 1);

        let restored = file.load();
        assert_eq!(restored.records.len(), 1);
        assert_eq!(restored.records[0].company_name, "IBM Corp.");
        // Only the snapshot itself remains; the temp file was renamed over it.
        assert_eq!(fs::read_dir(dir.path().join("nested")).unwrap().count(), 1);
    }

    #[test]
    fn test_restore_into_store_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("cache.json"));
        let (store, registry) = populated();
        file.save(&store, &registry).unwrap();

        let restored = file.load();
        let fresh_store = StockStore::default();
        let fresh_registry = TagRegistry::new();
        restored.apply(&fresh_store);

        // Loading alone creates no tags.
        assert!(fresh_registry.is_empty());

        restore_tags(&restored, &fresh_registry);
        assert_eq!(fresh_store.len(), 3);
        assert_eq!(fresh_registry.len(), 3);
        assert!(fresh_registry.focused().is_none());
        assert_eq!(fresh_registry.list_favorited(), vec![sym("AAPL"), sym("NVDA")]);
        assert_eq!(
            fresh_store.get(&sym("AAPL")).unwrap().price_history,
            store.get(&sym("AAPL")).unwrap().price_history
        );
    }
}
