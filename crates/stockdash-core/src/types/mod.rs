//! Core data types for the stock data cache.

mod bar;
mod record;
mod symbol;
mod timeframe;

pub use bar::Bar;
pub use record::{Fundamentals, Snapshot, StockRecord};
pub use symbol::Symbol;
pub use timeframe::{Period, Timeframe};
