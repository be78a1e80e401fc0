use clap::{Parser, Subcommand};

use crate::commands::analyze::AnalyzeArgs;
use crate::commands::funding::FundingArgs;
use crate::commands::watch::WatchArgs;

#[derive(Parser)]
#[command(name = "volscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Volatility and risk statistics from daily candles
    Analyze(AnalyzeArgs),

    /// Most negative funding rates right now
    Funding(FundingArgs),

    /// Scan funding rates periodically and print alerts until Ctrl+C
    Watch(WatchArgs),
}
