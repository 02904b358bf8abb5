//! CSV-backed history source.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use stockdash_core::error::FetchError;
use stockdash_core::traits::HistorySource;
use stockdash_core::types::{Bar, Period, Symbol, Timeframe};
use tracing::warn;

/// CSV record format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "date", alias = "timestamp", alias = "Timestamp", alias = "Datetime")]
    date: String,
    #[serde(alias = "Open", alias = "open")]
    open: f64,
    #[serde(alias = "High", alias = "high")]
    high: f64,
    #[serde(alias = "Low", alias = "low")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: f64,
}

/// History source reading one CSV file per symbol from a directory.
///
/// Looks for `<SYMBOL>.csv`, `<symbol>.csv`, `<SYMBOL>_daily.csv` or
/// `<symbol>_daily.csv` and keeps the rows inside the requested period.
pub struct CsvHistorySource {
    dir: PathBuf,
}

impl CsvHistorySource {
    /// Create a source over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the source reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn find_file(&self, symbol: &Symbol) -> Option<PathBuf> {
        let upper = symbol.as_str();
        let lower = upper.to_lowercase();
        [
            format!("{}.csv", upper),
            format!("{}.csv", lower),
            format!("{}_daily.csv", upper),
            format!("{}_daily.csv", lower),
        ]
        .into_iter()
        .map(|name| self.dir.join(name))
        .find(|path| path.is_file())
    }

    /// Load bars from a specific path.
    fn load_from_path(path: &Path) -> Result<Vec<Bar>, FetchError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        let mut bars = Vec::new();
        let mut skipped = 0usize;

        for result in reader.deserialize() {
            let record: CsvRecord = result.map_err(|e| FetchError::Parse(e.to_string()))?;
            let date = parse_timestamp(&record.date)?;

            let bar = Bar::new(
                date,
                record.open,
                record.high,
                record.low,
                record.close,
                record.volume,
            );
            if bar.is_finite() {
                bars.push(bar);
            } else {
                skipped += 1;
            }
        }

        if skipped > 0 {
            warn!(path = %path.display(), skipped, "Skipped rows with NaN or infinite values");
        }
        bars.sort_by_key(|b| b.date);

        Ok(bars)
    }
}

#[async_trait]
impl HistorySource for CsvHistorySource {
    async fn fetch_history(
        &self,
        symbol: &Symbol,
        period: Period,
        _interval: Timeframe,
    ) -> Result<Vec<Bar>, FetchError> {
        let path = self
            .find_file(symbol)
            .ok_or_else(|| FetchError::SymbolNotFound(symbol.to_string()))?;

        let bars = tokio::task::spawn_blocking(move || Self::load_from_path(&path))
            .await
            .map_err(|e| FetchError::Source(e.to_string()))??;

        // Periods are measured back from the last row so archived files stay usable.
        let start = bars.last().and_then(|last| period.start(last.date));
        let bars: Vec<Bar> = match start {
            Some(start) => bars.into_iter().filter(|b| b.date >= start).collect(),
            None => bars,
        };

        if bars.is_empty() {
            return Err(FetchError::NoData);
        }
        Ok(bars)
    }

    fn name(&self) -> &str {
        "csv"
    }
}

/// Parse various timestamp formats.
fn parse_timestamp(date_str: &str) -> Result<DateTime<Utc>, FetchError> {
    let date_str = date_str.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    let datetime_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for format in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Ok(dt.and_utc());
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
    for format in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(date_str, format) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return Ok(dt.and_utc());
            }
        }
    }

    // Unix timestamp, milliseconds if > 10 digits
    if let Ok(ts) = date_str.parse::<i64>() {
        let parsed = if ts > 10_000_000_000 {
            DateTime::from_timestamp_millis(ts)
        } else {
            DateTime::from_timestamp(ts, 0)
        };
        if let Some(dt) = parsed {
            return Ok(dt);
        }
    }

    Err(FetchError::Parse(format!("Could not parse date: {}", date_str)))
}
