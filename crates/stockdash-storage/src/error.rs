//! Storage errors.

use thiserror::Error;

/// Errors raised while writing a snapshot file.
///
/// Reading never fails; unreadable snapshots load as empty state.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to replace snapshot file: {0}")]
    Persist(#[from] tempfile::PersistError),
}
