use anyhow::{Context, Result};
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use volscope_analytics::{FundingScanner, ScannerConfig};
use volscope_core::{parse_symbol_list, IFundingSource, MarketCategory};
use volscope_exchanges::factory::get_source;
use tokio::sync::mpsc;
use volscope_scheduler::{
    AlertEvent, ChannelAlertSink, IAlertSink, InstrumentUniverse, LogAlertSink, Scheduler,
    SchedulerConfig, Subscription,
};

use super::common::{fmt_rate_pct, fmt_time};

#[derive(Args)]
pub struct WatchArgs {
    /// Subscriber ids to run scans for (comma-separated)
    #[arg(short, long = "subscriber", value_delimiter = ',', default_value = "default")]
    pub subscribers: Vec<String>,

    /// Exchange to query (supported: bybit)
    #[arg(short, long, default_value = "bybit")]
    pub exchange: String,

    /// Market category to scan (linear, inverse)
    #[arg(short, long, default_value = "linear")]
    pub market: String,

    /// Alert when a funding rate is at or below this value (fraction, -0.015 = -1.5%)
    #[arg(short, long, env = "FUNDING_THRESHOLD", default_value = "-0.015", allow_negative_numbers = true)]
    pub threshold: Decimal,

    /// Seconds between scans of the same subscriber
    #[arg(short, long, env = "SCAN_INTERVAL", default_value = "1200")]
    pub interval: u64,

    /// Seconds before the first scan
    #[arg(long, default_value = "10")]
    pub first_delay: u64,

    /// File with the instruments to scan (one per line or comma-separated).
    /// Every trading instrument of the market is scanned when omitted.
    #[arg(long)]
    pub symbols_file: Option<PathBuf>,

    /// Seconds between reloads of the exchange listing (0 to disable).
    /// Ignored with --symbols-file.
    #[arg(long, default_value = "3600")]
    pub refresh_interval: u64,

    /// Scans allowed to run at once across subscribers
    #[arg(long, default_value = "4")]
    pub max_concurrent_scans: usize,

    /// Funding fetches in flight per scan
    #[arg(long, default_value = "8")]
    pub max_concurrent_fetches: usize,

    /// Alert again when a reported rate falls at least this much further
    #[arg(long)]
    pub realert_step: Option<Decimal>,

    /// Write alerts to the log instead of stdout
    #[arg(long)]
    pub log_only: bool,
}

pub async fn execute(args: WatchArgs) -> Result<()> {
    let market: MarketCategory = args.market.parse()?;
    let subscription = Subscription::new(args.threshold, Duration::from_secs(args.interval), market)?;

    let client = Arc::new(get_source(&args.exchange)?);
    let universe = InstrumentUniverse::default();

    match &args.symbols_file {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read symbols file {}", path.display()))?;
            let count = universe.replace(parse_symbol_list(&content)).await;
            tracing::info!("Loaded {} symbols from {}", count, path.display());
        }
        None => {
            universe
                .refresh(&*client, market)
                .await
                .context("Failed to load the instrument listing")?;
        }
    }
    if universe.is_empty().await {
        anyhow::bail!("No instruments to scan");
    }

    let scanner = FundingScanner::new(client.clone(), ScannerConfig::new(args.max_concurrent_fetches)?);
    let (sink, mut alerts): (Arc<dyn IAlertSink>, Option<mpsc::Receiver<AlertEvent>>) =
        if args.log_only {
            (Arc::new(LogAlertSink), None)
        } else {
            let (sink, rx) = ChannelAlertSink::channel(256);
            (Arc::new(sink), Some(rx))
        };
    let config = SchedulerConfig {
        first_delay: Duration::from_secs(args.first_delay),
        max_concurrent_scans: args.max_concurrent_scans,
        realert_step: args.realert_step,
    };
    let scheduler = Scheduler::new(scanner, universe.clone(), sink, config)?;

    for subscriber in &args.subscribers {
        scheduler.activate(subscriber, subscription.clone())?;
    }

    let refresher = if args.symbols_file.is_none() && args.refresh_interval > 0 {
        Some(spawn_universe_refresh(
            universe,
            client,
            market,
            Duration::from_secs(args.refresh_interval),
        ))
    } else {
        None
    };

    println!(
        "Watching {} funding rates at or below {} every {}s for {}. Press Ctrl+C to stop.",
        market,
        fmt_rate_pct(args.threshold),
        args.interval,
        args.subscribers.join(", ")
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            maybe_alert = next_alert(&mut alerts) => {
                match maybe_alert {
                    Some(alert) => print_alert(&alert),
                    None => break,
                }
            }
            result = &mut shutdown => {
                match result {
                    Ok(()) => tracing::info!("Received Ctrl+C, stopping scans..."),
                    Err(e) => tracing::error!("Failed to listen for Ctrl+C signal: {}", e),
                }
                break;
            }
        }
    }

    if let Some(task) = refresher {
        task.abort();
    }
    scheduler.shutdown().await;

    Ok(())
}

fn spawn_universe_refresh(
    universe: InstrumentUniverse,
    source: Arc<dyn IFundingSource>,
    market: MarketCategory,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // the first tick completes immediately and the listing was just loaded
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = universe.refresh(source.as_ref(), market).await {
                tracing::warn!("Failed to refresh {} listing, keeping previous universe: {:#}", market, e);
            }
        }
    })
}

/// Next alert from the channel sink; never resolves when alerts go to the log.
async fn next_alert(alerts: &mut Option<mpsc::Receiver<AlertEvent>>) -> Option<AlertEvent> {
    match alerts {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_alert(alert: &AlertEvent) {
    println!(
        "[{}] {:<16} funding {:>10}  (subscriber: {})",
        fmt_time(alert.observed_at),
        alert.instrument,
        fmt_rate_pct(alert.rate),
        alert.subscriber_id
    );
}
