//! Core traits for the stock data cache.

mod history_source;

pub use history_source::HistorySource;
