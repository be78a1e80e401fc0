use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AnalyticsError;

/// Market segment an instrument trades on (Bybit v5 "category").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MarketCategory {
    Linear,
    Inverse,
    Spot,
}

impl MarketCategory {
    /// Lookup order used when resolving an unqualified symbol.
    pub const SEARCH_ORDER: [MarketCategory; 3] = [
        MarketCategory::Linear,
        MarketCategory::Inverse,
        MarketCategory::Spot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketCategory::Linear => "linear",
            MarketCategory::Inverse => "inverse",
            MarketCategory::Spot => "spot",
        }
    }

    /// Spot markets have no funding.
    pub fn has_funding(&self) -> bool {
        !matches!(self, MarketCategory::Spot)
    }
}

impl fmt::Display for MarketCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketCategory {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(MarketCategory::Linear),
            "inverse" => Ok(MarketCategory::Inverse),
            "spot" => Ok(MarketCategory::Spot),
            other => Err(AnalyticsError::InvalidConfig(format!(
                "unknown market category '{}', expected linear, inverse or spot",
                other
            ))),
        }
    }
}

/// One daily OHLCV summary. Sequences handed to the analytics engine are
/// ordered by strictly increasing `open_time`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub turnover: Decimal,
}

impl Candle {
    /// Intraday move from open to high, `None` when open is not positive.
    pub fn pump(&self) -> Option<Decimal> {
        if self.open <= Decimal::ZERO {
            return None;
        }
        Some((self.high - self.open) / self.open)
    }

    /// Intraday move from open to low, `None` when open is not positive.
    pub fn dump(&self) -> Option<Decimal> {
        if self.open <= Decimal::ZERO {
            return None;
        }
        Some((self.low - self.open) / self.open)
    }

    /// True range against the previous candle's close.
    pub fn true_range(&self, prev_close: Decimal) -> Decimal {
        let high_low = self.high - self.low;
        let high_prev = (self.high - prev_close).abs();
        let low_prev = (self.low - prev_close).abs();
        high_low.max(high_prev).max(low_prev)
    }
}

/// Latest funding rate observed for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FundingSnapshot {
    pub instrument: String,
    pub market: MarketCategory,
    pub rate: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Exchange listing entry used to build the scan universe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instrument {
    pub symbol: String,
    pub market: MarketCategory,
    pub base_coin: String,
    pub quote_coin: String,
    pub trading: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            open_time: Utc::now(),
            open,
            high,
            low,
            close,
            volume: Decimal::ZERO,
            turnover: Decimal::ZERO,
        }
    }

    #[test]
    fn test_market_category_parse() {
        assert_eq!("linear".parse::<MarketCategory>().unwrap(), MarketCategory::Linear);
        assert_eq!(" Inverse ".parse::<MarketCategory>().unwrap(), MarketCategory::Inverse);
        assert_eq!("SPOT".parse::<MarketCategory>().unwrap(), MarketCategory::Spot);
        assert!("option".parse::<MarketCategory>().is_err());
    }

    #[test]
    fn test_market_category_funding() {
        assert!(MarketCategory::Linear.has_funding());
        assert!(MarketCategory::Inverse.has_funding());
        assert!(!MarketCategory::Spot.has_funding());
    }

    #[test]
    fn test_candle_pump_and_dump() {
        let c = candle(dec!(100), dec!(105), dec!(98), dec!(102));
        assert_eq!(c.pump(), Some(dec!(0.05)));
        assert_eq!(c.dump(), Some(dec!(-0.02)));

        let zero_open = candle(Decimal::ZERO, dec!(1), dec!(0), dec!(1));
        assert_eq!(zero_open.pump(), None);
        assert_eq!(zero_open.dump(), None);
    }

    #[test]
    fn test_true_range_uses_gap_to_previous_close() {
        // Gap up: previous close far below today's low
        let c = candle(dec!(110), dec!(112), dec!(109), dec!(111));
        assert_eq!(c.true_range(dec!(100)), dec!(12));

        // Inside day: high-low dominates
        assert_eq!(c.true_range(dec!(110)), dec!(3));
    }
}
