//! Toggle favorite command.

use anyhow::{Context, Result};
use std::path::Path;
use stockdash_core::types::Symbol;

use crate::app::App;
use crate::cli::SymbolArgs;

pub async fn run(args: SymbolArgs, config_path: &Path) -> Result<()> {
    let symbol = Symbol::new(&args.symbol).context("Invalid symbol")?;
    let app = App::open(config_path, None)?;

    match app.registry.toggle_favorite(&symbol) {
        Some(true) => println!("{} added to favorites", symbol),
        Some(false) => println!("{} removed from favorites", symbol),
        None => {
            println!("No tag for {}", symbol);
            return Ok(());
        }
    }

    app.save()?;
    Ok(())
}
