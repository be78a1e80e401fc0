use crate::bybit::error::BybitError;
use crate::bybit::types::{BybitInstrument, BybitTicker};
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use volscope_core::types::{Candle, FundingSnapshot, Instrument, MarketCategory};

fn parse_millis(raw: &str) -> Result<DateTime<Utc>> {
    let millis = raw.parse::<i64>()?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| BybitError::MalformedKline(format!("timestamp out of range: {}", raw)).into())
}

/// Convert one kline row `[startTime, open, high, low, close, volume, turnover]`.
/// Turnover is optional.
pub fn candle_from_row(row: &[String]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(BybitError::MalformedKline(format!(
            "expected at least 6 fields, got {}",
            row.len()
        ))
        .into());
    }

    Ok(Candle {
        open_time: parse_millis(&row[0])?,
        open: Decimal::from_str(&row[1])?,
        high: Decimal::from_str(&row[2])?,
        low: Decimal::from_str(&row[3])?,
        close: Decimal::from_str(&row[4])?,
        volume: Decimal::from_str(&row[5])?,
        turnover: match row.get(6) {
            Some(raw) => Decimal::from_str(raw)?,
            None => Decimal::ZERO,
        },
    })
}

/// Convert a kline page (newest first) into candles ordered by strictly
/// increasing open time. Duplicate open times keep the last row seen.
pub fn candles_from_rows(rows: &[Vec<String>]) -> Result<Vec<Candle>> {
    let mut candles = rows
        .iter()
        .map(|row| candle_from_row(row))
        .collect::<Result<Vec<_>>>()?;

    candles.sort_by_key(|c| c.open_time);
    candles.dedup_by(|later, earlier| {
        if later.open_time == earlier.open_time {
            std::mem::swap(later, earlier);
            true
        } else {
            false
        }
    });
    Ok(candles)
}

/// Funding snapshot from a ticker entry; `Ok(None)` when the ticker carries
/// no funding rate (spot, pre-launch contracts).
pub fn funding_from_ticker(
    ticker: &BybitTicker,
    market: MarketCategory,
    observed_at: DateTime<Utc>,
) -> Result<Option<FundingSnapshot>> {
    let raw = ticker.funding_rate.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    Ok(Some(FundingSnapshot {
        instrument: ticker.symbol.clone(),
        market,
        rate: Decimal::from_str(raw)?,
        observed_at,
    }))
}

pub fn instrument_from_raw(raw: BybitInstrument, market: MarketCategory) -> Instrument {
    Instrument {
        trading: raw.status == "Trading",
        symbol: raw.symbol,
        market,
        base_coin: raw.base_coin,
        quote_coin: raw.quote_coin,
    }
}
