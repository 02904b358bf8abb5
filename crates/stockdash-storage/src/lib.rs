//! Snapshot persistence for the stock cache and tag favorites.

mod error;
mod snapshot;

pub use error::StorageError;
pub use snapshot::{restore_tags, PersistedRecord, RestoredState, SnapshotFile};
