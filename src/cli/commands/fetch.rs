//! Fetch command implementation.

use anyhow::{Context, Result};
use futures::future::join_all;
use std::path::Path;
use stockdash_cache::FetchOutcome;
use stockdash_core::types::Symbol;
use tracing::{info, warn};

use crate::app::App;
use crate::cli::FetchArgs;

pub async fn run(args: FetchArgs, config_path: &Path) -> Result<()> {
    let app = App::open(config_path, args.data)?;

    let symbols = args
        .symbols
        .iter()
        .map(|raw| Symbol::new(raw))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid symbol")?;

    info!("Requesting data for {} symbols", symbols.len());

    let handles: Vec<_> = symbols
        .iter()
        .map(|symbol| {
            app.registry.add(symbol, None);
            app.service.ensure_fresh(symbol, None, |outcome| {
                if let Some(error) = outcome.error() {
                    warn!(symbol = %outcome.record().symbol, error = %error, "Data may be stale");
                }
            })
        })
        .collect();

    let max_wait = app.service.max_wait();
    let outcomes = join_all(handles.into_iter().map(|handle| handle.outcome(max_wait))).await;

    for (symbol, outcome) in symbols.iter().zip(outcomes) {
        match outcome {
            Some(FetchOutcome::Cached(record)) => {
                println!("{:<8} cached    {:>5} rows", symbol, record.history_len());
            }
            Some(FetchOutcome::Fetched(record)) => {
                println!("{:<8} fetched   {:>5} rows", symbol, record.history_len());
            }
            Some(FetchOutcome::Failed { record, error }) => {
                println!(
                    "{:<8} failed    {:>5} rows  ({}; showing last saved data)",
                    symbol,
                    record.history_len(),
                    error
                );
            }
            None => println!("{:<8} pending   still fetching after {:?}", symbol, max_wait),
        }
    }

    if args.cleanup {
        let report = app.service.cleanup();
        info!("Evicted {} records", report.removed());
    }

    let saved = app.save()?;
    info!("Saved {} entries to {}", saved, app.snapshot.path().display());

    Ok(())
}
