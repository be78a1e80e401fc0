use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use volscope_analytics::{MetricsConfig, MetricsResult, MetricsService, DEFAULT_MIN_CANDLES};
use volscope_core::normalize_symbol;
use volscope_exchanges::factory::get_source;

use super::common::{fmt_date, fmt_pct, fmt_time, fmt_value, resolve_market, UNAVAILABLE};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Symbol to analyze (e.g., PEPE or PEPEUSDT)
    pub symbol: String,

    /// Exchange to query (supported: bybit)
    #[arg(short, long, default_value = "bybit")]
    pub exchange: String,

    /// Market category (linear, inverse, spot); looked up when omitted
    #[arg(short, long)]
    pub market: Option<String>,

    /// Number of daily candles to fetch (at most 1000)
    #[arg(short, long, env = "MAX_CANDLES", default_value = "1000")]
    pub limit: u32,

    /// Minimum number of candles required for a report
    #[arg(long, env = "MIN_CANDLES", default_value_t = DEFAULT_MIN_CANDLES)]
    pub min_candles: usize,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

pub async fn execute(args: AnalyzeArgs) -> Result<()> {
    let symbol = normalize_symbol(&args.symbol);
    if symbol.is_empty() {
        anyhow::bail!("Symbol must not be empty");
    }

    let client = Arc::new(get_source(&args.exchange)?);
    let market = resolve_market(&*client, &symbol, args.market.as_deref()).await?;

    let config = MetricsConfig::new(args.min_candles, args.limit)?;
    let service = MetricsService::new(client, config);
    let result = service.analyze(&symbol, market).await?;

    match args.format.to_lowercase().as_str() {
        "json" => display_json(&result)?,
        "table" => display_table(&result),
        _ => display_table(&result),
    }

    Ok(())
}

fn display_json(result: &MetricsResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn display_table(result: &MetricsResult) {
    println!("\n╔══════════════════════════════════════════════════════════════════╗");
    println!("║  Volatility Report: {} ({})", result.symbol, result.market);
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!(
        "║  {} daily candles, {} to {}",
        result.candle_count,
        fmt_date(result.first_open_time),
        fmt_date(result.last_open_time)
    );
    println!("║  Last Close:        {:>20}", fmt_value(Some(result.last_close)));
    println!("║");

    println!("║  VOLATILITY");
    println!("║  ─────────────────────────────────────────────────────────────");
    println!("║  Daily:             {:>20}", fmt_pct(result.daily_volatility));
    println!("║  Weekly:            {:>20}", fmt_pct(result.weekly_volatility));
    println!("║");

    println!("║  CLOSE-TO-CLOSE");
    println!("║  ─────────────────────────────────────────────────────────────");
    println!("║  Max Daily Surge:   {:>20}", fmt_pct(result.max_daily_surge));
    println!("║  Max Daily Crash:   {:>20}", fmt_pct(result.max_daily_crash));
    println!("║");

    println!("║  INTRADAY (OPEN TO HIGH / LOW)");
    println!("║  ─────────────────────────────────────────────────────────────");
    match &result.max_intraday_pump {
        Some(pump) => println!(
            "║  Max Pump:          {:>20} on {}",
            fmt_pct(Some(pump.value)),
            fmt_date(pump.open_time)
        ),
        None => println!("║  Max Pump:          {:>20}", UNAVAILABLE),
    }
    match &result.max_intraday_dump {
        Some(dump) => println!(
            "║  Max Dump:          {:>20} on {}",
            fmt_pct(Some(dump.value)),
            fmt_date(dump.open_time)
        ),
        None => println!("║  Max Dump:          {:>20}", UNAVAILABLE),
    }
    if let Some(summary) = &result.pump_summary {
        println!(
            "║  Avg Pump:          {:>20} (σ {})",
            fmt_pct(Some(summary.mean)),
            fmt_pct(summary.std_dev)
        );
    }
    if let Some(summary) = &result.dump_summary {
        println!(
            "║  Avg Dump:          {:>20} (σ {})",
            fmt_pct(Some(summary.mean)),
            fmt_pct(summary.std_dev)
        );
    }
    println!("║");

    println!("║  AVERAGE TRUE RANGE");
    println!("║  ─────────────────────────────────────────────────────────────");
    println!("║  ATR 14:            {:>20}", fmt_value(result.atr14));
    println!("║  ATR 28:            {:>20}", fmt_value(result.atr28));
    println!("║  ATR 14 / Close:    {:>20}", fmt_pct(result.atr_relative));
    println!("║");

    println!("║  PUMP PERCENTILES");
    println!("║  ─────────────────────────────────────────────────────────────");
    for (label, value) in &result.pump_percentiles {
        println!("║  P{:<17} {:>20}", label, fmt_pct(*value));
    }
    println!("║");

    println!("║  Computed at {}", fmt_time(result.computed_at));
    println!("╚══════════════════════════════════════════════════════════════════╝\n");

    let unavailable = result.unavailable_fields();
    if !unavailable.is_empty() {
        tracing::info!(
            "{} statistics unavailable for {} ({} candles): {}",
            unavailable.len(),
            result.symbol,
            result.candle_count,
            unavailable.join(", ")
        );
    }
}
