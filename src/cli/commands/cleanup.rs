//! Cache cleanup command.

use anyhow::Result;
use std::path::Path;

use crate::app::App;

pub async fn run(config_path: &Path) -> Result<()> {
    let app = App::open(config_path, None)?;
    let before = app.service.store().len();

    let report = app.service.cleanup();

    println!("Cache records: {} -> {}", before, app.service.store().len());
    println!("  expired:  {}", report.expired.len());
    println!(
        "  overflow: {} (limit {})",
        report.overflow.len(),
        app.config.cache.max_entries
    );

    app.save()?;
    Ok(())
}
