use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use volscope_core::{IMarketLookup, MarketCategory};

/// Placeholder for a statistic that could not be computed.
pub const UNAVAILABLE: &str = "n/a";

/// Resolve the market category for a symbol: an explicit `--market` wins,
/// otherwise the first category the exchange lists the symbol on.
pub async fn resolve_market(
    lookup: &dyn IMarketLookup,
    symbol: &str,
    market: Option<&str>,
) -> anyhow::Result<MarketCategory> {
    if let Some(market) = market {
        return Ok(market.parse()?);
    }
    match lookup.find_market(symbol).await? {
        Some(market) => {
            tracing::debug!("Resolved {} to the {} market", symbol, market);
            Ok(market)
        }
        None => anyhow::bail!(
            "Symbol {} is not listed on any market (linear, inverse, spot)",
            symbol
        ),
    }
}

/// Fraction as a percentage with 2 decimal places: 0.0534 -> "5.34%".
pub fn fmt_pct(value: Option<Decimal>) -> String {
    match value {
        Some(v) => format!("{:.2}%", (v * dec!(100)).round_dp(2)),
        None => UNAVAILABLE.to_string(),
    }
}

/// Funding rates need more precision: -0.000125 -> "-0.0125%".
pub fn fmt_rate_pct(rate: Decimal) -> String {
    format!("{}%", (rate * dec!(100)).round_dp(4).normalize())
}

pub fn fmt_value(value: Option<Decimal>) -> String {
    match value {
        Some(v) => v.round_dp(8).normalize().to_string(),
        None => UNAVAILABLE.to_string(),
    }
}

pub fn fmt_date(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d").to_string()
}

pub fn fmt_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
