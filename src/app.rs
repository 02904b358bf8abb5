//! Process-level wiring of the cache service, tag registry and snapshot file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stockdash_cache::{CacheService, CsvHistorySource};
use stockdash_config::{load_config, AppConfig};
use stockdash_storage::{restore_tags, SnapshotFile};
use stockdash_tags::TagRegistry;
use tokio::runtime::Handle;
use tracing::debug;

/// Everything a command needs, restored from the last saved snapshot.
pub struct App {
    pub config: AppConfig,
    pub service: CacheService,
    pub registry: TagRegistry,
    pub snapshot: SnapshotFile,
}

impl App {
    /// Load configuration, build the service and restore saved state.
    pub fn open(config_path: &Path, data_dir: Option<PathBuf>) -> Result<Self> {
        let config = load_config(config_path)
            .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
        let settings = config.cache_settings().context("Invalid configuration")?;

        let data_dir = data_dir.unwrap_or_else(|| config.data.csv_dir.clone());
        debug!(dir = %data_dir.display(), "Using CSV history source");
        let source = Arc::new(CsvHistorySource::new(data_dir));
        let service = CacheService::new(settings, source, Handle::current());

        let snapshot = SnapshotFile::new(config.cache.snapshot_path.clone());
        let restored = snapshot.load();
        restored.apply(service.store());

        let registry = TagRegistry::new();
        restore_tags(&restored, &registry);

        Ok(Self {
            config,
            service,
            registry,
            snapshot,
        })
    }

    /// Persist the store and favorites.
    pub fn save(&self) -> Result<usize> {
        self.snapshot
            .save(self.service.store(), &self.registry)
            .with_context(|| format!("Failed to save {}", self.snapshot.path().display()))
    }
}
