//! Stock data cache and tag manager CLI.

mod app;
mod cli;
mod logging;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use logging::{resolve_logging, setup_logging};
use stockdash_config::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging. A broken config is reported by the command itself.
    let logging_config = load_config(&cli.config).map(|c| c.logging).unwrap_or_default();
    let (level, json) = resolve_logging(cli.log_level.map(|l| l.as_str()), cli.json_logs, &logging_config);
    setup_logging(&level, json);

    // Execute command
    match cli.command {
        Commands::Fetch(args) => cli::commands::fetch::run(args, &cli.config).await,
        Commands::Tags => cli::commands::tags::run(&cli.config).await,
        Commands::Favorite(args) => cli::commands::favorite::run(args, &cli.config).await,
        Commands::Remove(args) => cli::commands::remove::run(args, &cli.config).await,
        Commands::Cleanup => cli::commands::cleanup::run(&cli.config).await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config).await,
    }
}
