use anyhow::Result;
use clap::Args;
use prettytable::{format, Cell, Row, Table};
use std::sync::Arc;
use volscope_analytics::{FundingScanner, ScannerConfig, DEFAULT_TOP_LIMIT};
use volscope_core::{FundingSnapshot, MarketCategory};
use volscope_exchanges::factory::get_source;

use super::common::{fmt_rate_pct, fmt_time};

#[derive(Args)]
pub struct FundingArgs {
    /// Exchange to query (supported: bybit)
    #[arg(short, long, default_value = "bybit")]
    pub exchange: String,

    /// Market category (linear, inverse)
    #[arg(short, long, default_value = "linear")]
    pub market: String,

    /// Number of instruments to show
    #[arg(short, long, default_value_t = DEFAULT_TOP_LIMIT)]
    pub limit: usize,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

pub async fn execute(args: FundingArgs) -> Result<()> {
    let market: MarketCategory = args.market.parse()?;
    tracing::info!(
        "Fetching top {} negative funding rates on {} ({})",
        args.limit,
        args.exchange,
        market
    );

    let client = Arc::new(get_source(&args.exchange)?);
    let scanner = FundingScanner::new(client, ScannerConfig::default());
    let top = scanner.top_negative(market, args.limit).await?;

    match args.format.to_lowercase().as_str() {
        "json" => display_json(&top)?,
        "table" => display_table(&top, market),
        _ => display_table(&top, market),
    }

    Ok(())
}

fn display_json(top: &[FundingSnapshot]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(top)?);
    Ok(())
}

fn display_table(top: &[FundingSnapshot], market: MarketCategory) {
    if top.is_empty() {
        println!("No negative funding rates on {} right now.", market);
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

    table.set_titles(Row::new(vec![Cell::new(&format!(
        "Top {} Negative Funding Rates ({})",
        top.len(),
        market
    ))
    .with_hspan(3)]));

    table.add_row(Row::new(vec![
        Cell::new("#").with_style(prettytable::Attr::Bold),
        Cell::new("Symbol").with_style(prettytable::Attr::Bold),
        Cell::new("Funding Rate").with_style(prettytable::Attr::Bold),
    ]));

    for (i, snapshot) in top.iter().enumerate() {
        table.add_row(Row::new(vec![
            Cell::new_align(&(i + 1).to_string(), format::Alignment::RIGHT),
            Cell::new(&snapshot.instrument),
            Cell::new_align(&fmt_rate_pct(snapshot.rate), format::Alignment::RIGHT),
        ]));
    }

    if let Some(first) = top.first() {
        table.add_row(Row::new(vec![
            Cell::new("Observed").with_style(prettytable::Attr::Bold),
            Cell::new_align(&fmt_time(first.observed_at), format::Alignment::RIGHT).with_hspan(2),
        ]));
    }

    println!();
    table.printstd();
    println!();
}
