//! Stock record store, background fetch coordination and eviction.

mod coordinator;
mod csv_source;
mod eviction;
mod service;
mod store;

pub use coordinator::{FetchCoordinator, FetchHandle, FetchOutcome, FetchSettings};
pub use csv_source::CsvHistorySource;
pub use eviction::{EvictionPolicy, EvictionReport};
pub use service::{CacheService, CacheSettings};
pub use store::{StockStore, DEFAULT_TTL_SECS};
