mod aggregate;
mod cli;
mod commands;
mod cost;
mod data_loader;
mod models;
mod pricing;
mod report;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{show_daily, show_monthly, show_sessions, show_status};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daily { args } => show_daily(&args).await?,
        Commands::Monthly { args } => show_monthly(&args).await?,
        Commands::Sessions { args } => show_sessions(&args).await?,
        Commands::Status { args } => show_status(&args).await?,
    }

    Ok(())
}
