//! Registry of followed stock tags.

mod registry;

pub use registry::{StockTag, TagRegistry};
