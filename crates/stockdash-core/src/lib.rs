//! Core types and traits for the stock data cache.
//!
//! This crate provides the foundational building blocks including:
//! - Normalized symbols and price history rows
//! - Cached stock records and their freshness predicate
//! - The history source trait consumed by the fetch coordinator

pub mod error;
pub mod traits;
pub mod types;

pub use error::{CacheError, FetchError};
pub use traits::*;
pub use types::*;
