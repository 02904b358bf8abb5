//! List tags command.

use anyhow::Result;
use chrono::Utc;
use std::path::Path;

use crate::app::App;

pub async fn run(config_path: &Path) -> Result<()> {
    let app = App::open(config_path, None)?;
    let store = app.service.store();
    let tags = app.registry.list_active();

    if tags.is_empty() {
        println!("No tags. Use `stockdash fetch -S <SYMBOLS>` to add some.");
        return Ok(());
    }

    println!("{:<2} {:<8} {:<28} {:>12} {:>9}  {}", "", "SYMBOL", "COMPANY", "PRICE", "CHANGE%", "UPDATED");
    println!("───────────────────────────────────────────────────────────────────────────────");

    let now = Utc::now();
    for tag in tags {
        let star = if tag.is_favorited { "*" } else { "" };
        let record = tag.record(store);

        let price = record
            .as_ref()
            .and_then(|r| r.snapshot.current_price)
            .map_or_else(|| "-".to_string(), |p| format!("{:.2}", p));
        let change = record
            .as_ref()
            .and_then(|r| r.snapshot.change_percent)
            .map_or_else(|| "-".to_string(), |c| format!("{:+.2}", c));
        let updated = match record.as_ref().and_then(|r| r.last_updated) {
            Some(at) => {
                let freshness = if store.is_fresh(&tag.symbol, store.ttl()) { "fresh" } else { "stale" };
                format!("{}m ago ({})", (now - at).num_minutes(), freshness)
            }
            None => "never".to_string(),
        };

        println!(
            "{:<2} {:<8} {:<28} {:>12} {:>9}  {}",
            star, tag.symbol, tag.company_name, price, change, updated
        );
    }

    Ok(())
}
