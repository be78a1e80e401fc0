mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is fine
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volscope=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => {
            commands::analyze::execute(args).await?;
        }
        Commands::Funding(args) => {
            commands::funding::execute(args).await?;
        }
        Commands::Watch(args) => {
            commands::watch::execute(args).await?;
        }
    }

    Ok(())
}
