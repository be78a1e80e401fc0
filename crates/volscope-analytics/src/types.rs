use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use volscope_core::{AnalyticsError, FundingSnapshot, MarketCategory};

/// Default minimum candle count for a metrics result.
pub const DEFAULT_MIN_CANDLES: usize = 29;

/// Largest candle history a single kline request returns.
pub const MAX_CANDLES: u32 = 1000;

/// Percentile labels reported for the intraday pump distribution.
pub const PUMP_PERCENTILES: [u8; 6] = [75, 80, 85, 90, 95, 99];

/// A single extreme value and the candle it came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Extreme {
    pub value: Decimal,
    pub open_time: DateTime<Utc>,
}

/// Mean and sample standard deviation of a series of intraday moves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveSummary {
    pub count: usize,
    pub mean: Decimal,
    /// `None` with fewer than two observations
    pub std_dev: Option<Decimal>,
}

/// Volatility and risk statistics derived from one daily candle history.
///
/// Every field that can be impossible to compute is an `Option`;
/// `None` means "unavailable" and is never a stand-in for zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsResult {
    pub symbol: String,
    pub market: MarketCategory,
    pub candle_count: usize,
    pub first_open_time: DateTime<Utc>,
    pub last_open_time: DateTime<Utc>,
    pub last_close: Decimal,
    pub computed_at: DateTime<Utc>,

    /// Sample std dev of daily log returns
    pub daily_volatility: Option<Decimal>,
    /// Sample std dev of log returns between weekly closes
    pub weekly_volatility: Option<Decimal>,

    pub max_daily_surge: Option<Decimal>,
    pub max_daily_crash: Option<Decimal>,

    pub max_intraday_pump: Option<Extreme>,
    pub max_intraday_dump: Option<Extreme>,

    pub atr14: Option<Decimal>,
    pub atr28: Option<Decimal>,
    /// ATR14 as a fraction of the last close
    pub atr_relative: Option<Decimal>,

    /// Keyed by percentile label (75, 80, 85, 90, 95, 99)
    pub pump_percentiles: BTreeMap<u8, Option<Decimal>>,

    pub pump_summary: Option<MoveSummary>,
    pub dump_summary: Option<MoveSummary>,
}

impl MetricsResult {
    pub fn pump_percentile(&self, label: u8) -> Option<Decimal> {
        self.pump_percentiles.get(&label).copied().flatten()
    }

    /// Names of the fields that could not be computed.
    pub fn unavailable_fields(&self) -> Vec<String> {
        let scalars = [
            ("daily_volatility", self.daily_volatility.is_none()),
            ("weekly_volatility", self.weekly_volatility.is_none()),
            ("max_daily_surge", self.max_daily_surge.is_none()),
            ("max_daily_crash", self.max_daily_crash.is_none()),
            ("max_intraday_pump", self.max_intraday_pump.is_none()),
            ("max_intraday_dump", self.max_intraday_dump.is_none()),
            ("atr14", self.atr14.is_none()),
            ("atr28", self.atr28.is_none()),
            ("atr_relative", self.atr_relative.is_none()),
            ("pump_summary", self.pump_summary.is_none()),
            ("dump_summary", self.dump_summary.is_none()),
        ];

        let mut missing: Vec<String> = scalars
            .iter()
            .filter(|(_, missing)| *missing)
            .map(|(name, _)| name.to_string())
            .collect();
        missing.extend(
            self.pump_percentiles
                .iter()
                .filter(|(_, v)| v.is_none())
                .map(|(label, _)| format!("pump_p{}", label)),
        );
        missing
    }
}

/// Tunables for the metrics engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Minimum candle count; never below 2
    pub min_candles: usize,
    /// Candles requested per fetch; at most 1000
    pub max_candles: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            min_candles: DEFAULT_MIN_CANDLES,
            max_candles: MAX_CANDLES,
        }
    }
}

impl MetricsConfig {
    /// `min_candles` is clamped to at least 2 and `max_candles` into 1..=1000.
    /// Fails when the fetch size could never satisfy the minimum.
    pub fn new(min_candles: usize, max_candles: u32) -> Result<Self, AnalyticsError> {
        let config = Self {
            min_candles: min_candles.max(2),
            max_candles: max_candles.clamp(1, MAX_CANDLES),
        };
        if config.min_candles > config.max_candles as usize {
            return Err(AnalyticsError::InvalidConfig(format!(
                "min_candles ({}) exceeds max_candles ({})",
                config.min_candles, config.max_candles
            )));
        }
        Ok(config)
    }
}

/// Tunables for the funding scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    pub max_concurrent_fetches: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
        }
    }
}

impl ScannerConfig {
    pub fn new(max_concurrent_fetches: usize) -> Result<Self, AnalyticsError> {
        if max_concurrent_fetches == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_concurrent_fetches,
        })
    }
}

/// Outcome of one funding scan over a set of instruments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanReport {
    pub market: MarketCategory,
    pub threshold: Decimal,
    /// Snapshots at or below the threshold, most negative first
    pub hits: Vec<FundingSnapshot>,
    pub attempted: usize,
    pub fetched: usize,
    pub failed: usize,
    pub completed_at: DateTime<Utc>,
}

impl ScanReport {
    pub fn hit_instruments(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|h| h.instrument.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_clamps() {
        let config = MetricsConfig::new(0, 5000).unwrap();
        assert_eq!(config.min_candles, 2);
        assert_eq!(config.max_candles, 1000);
    }

    #[test]
    fn test_metrics_config_rejects_unreachable_minimum() {
        assert!(matches!(
            MetricsConfig::new(50, 30),
            Err(AnalyticsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_scanner_config_rejects_zero() {
        assert!(ScannerConfig::new(0).is_err());
        assert_eq!(ScannerConfig::new(3).unwrap().max_concurrent_fetches, 3);
    }
}
