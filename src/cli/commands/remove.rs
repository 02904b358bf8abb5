//! Remove tag command.

use anyhow::{Context, Result};
use std::path::Path;
use stockdash_core::types::Symbol;

use crate::app::App;
use crate::cli::SymbolArgs;

pub async fn run(args: SymbolArgs, config_path: &Path) -> Result<()> {
    let symbol = Symbol::new(&args.symbol).context("Invalid symbol")?;
    let app = App::open(config_path, None)?;

    let removed = app.registry.remove(&symbol);
    app.service.store().remove(&symbol);

    match removed {
        Some(tag) => println!("Removed {} ({})", tag.symbol, tag.company_name),
        None => println!("No tag for {}", symbol),
    }

    app.save()?;
    Ok(())
}
