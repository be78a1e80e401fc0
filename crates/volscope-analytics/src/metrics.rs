use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::time::Instant;
use volscope_core::{AnalyticsError, Candle, MarketCategory};

use crate::stats::{log_return, mean, pct_change, percentile_linear, sample_std_dev};
use crate::types::{Extreme, MetricsConfig, MetricsResult, MoveSummary, PUMP_PERCENTILES};

/// Trailing true-range windows for the short and long ATR.
pub const ATR_SHORT_WINDOW: usize = 14;
pub const ATR_LONG_WINDOW: usize = 28;

/// Spacing between weekly closes, counted in daily candles.
pub const WEEK_SPACING: usize = 7;

/// IMetricsEngine derives volatility and risk statistics from daily candles.
///
/// Implementations are pure: no I/O, no suspension, the same candles always
/// give the same statistics.
pub trait IMetricsEngine: Send + Sync {
    /// Computes every metric for a candle sequence ordered by increasing
    /// open time.
    ///
    /// Fails with `InsufficientData` when the sequence is shorter than the
    /// configured minimum. Individual metrics that cannot be computed from a
    /// long enough sequence come back as `None`.
    fn compute(
        &self,
        symbol: &str,
        market: MarketCategory,
        candles: &[Candle],
    ) -> Result<MetricsResult, AnalyticsError>;

    fn min_candles(&self) -> usize;
}

/// Default implementation of the IMetricsEngine trait
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: MetricsConfig,
}

impl MetricsEngine {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }
}

impl IMetricsEngine for MetricsEngine {
    fn compute(
        &self,
        symbol: &str,
        market: MarketCategory,
        candles: &[Candle],
    ) -> Result<MetricsResult, AnalyticsError> {
        let required = self.min_candles();
        let insufficient = AnalyticsError::InsufficientData {
            required,
            available: candles.len(),
        };
        if candles.len() < required {
            return Err(insufficient);
        }
        let (first, last) = match (candles.first(), candles.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(insufficient),
        };

        let start = Instant::now();

        let daily_returns = daily_log_returns(candles);
        let weekly_returns = log_returns(&weekly_closes(candles));
        let changes = daily_changes(candles);

        let true_ranges = true_ranges(candles);
        let atr14 = average_true_range(&true_ranges, ATR_SHORT_WINDOW);
        let atr28 = average_true_range(&true_ranges, ATR_LONG_WINDOW);
        let atr_relative = match atr14 {
            Some(atr) if last.close > Decimal::ZERO => Some(atr / last.close),
            _ => None,
        };

        let pumps: Vec<Decimal> = candles.iter().filter_map(Candle::pump).collect();
        let dumps: Vec<Decimal> = candles.iter().filter_map(Candle::dump).collect();

        let result = MetricsResult {
            symbol: symbol.to_string(),
            market,
            candle_count: candles.len(),
            first_open_time: first.open_time,
            last_open_time: last.open_time,
            last_close: last.close,
            computed_at: Utc::now(),
            daily_volatility: sample_std_dev(&daily_returns),
            weekly_volatility: sample_std_dev(&weekly_returns),
            max_daily_surge: changes.iter().copied().max(),
            max_daily_crash: changes.iter().copied().min(),
            max_intraday_pump: extreme(candles, Candle::pump, |a, b| a > b),
            max_intraday_dump: extreme(candles, Candle::dump, |a, b| a < b),
            atr14,
            atr28,
            atr_relative,
            pump_percentiles: pump_percentiles(&pumps),
            pump_summary: summarize(&pumps),
            dump_summary: summarize(&dumps),
        };

        tracing::debug!(
            "Computed metrics for {} ({}) from {} candles in {:.2?}, unavailable: {:?}",
            symbol,
            market,
            candles.len(),
            start.elapsed(),
            result.unavailable_fields()
        );

        Ok(result)
    }

    fn min_candles(&self) -> usize {
        self.config.min_candles.max(2)
    }
}

fn log_returns(closes: &[Decimal]) -> Vec<Decimal> {
    closes
        .windows(2)
        .filter_map(|pair| log_return(pair[0], pair[1]))
        .collect()
}

/// Log returns between adjacent closes; pairs with a non-positive close are skipped.
pub fn daily_log_returns(candles: &[Candle]) -> Vec<Decimal> {
    let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
    log_returns(&closes)
}

/// Every 7th close counting back from the latest candle, in time order.
pub fn weekly_closes(candles: &[Candle]) -> Vec<Decimal> {
    let mut closes: Vec<Decimal> = candles
        .iter()
        .rev()
        .step_by(WEEK_SPACING)
        .map(|c| c.close)
        .collect();
    closes.reverse();
    closes
}

/// Simple close-to-close changes; pairs with a non-positive previous close are skipped.
pub fn daily_changes(candles: &[Candle]) -> Vec<Decimal> {
    candles
        .windows(2)
        .filter_map(|pair| pct_change(pair[0].close, pair[1].close))
        .collect()
}

/// True range of every candle that has a predecessor.
pub fn true_ranges(candles: &[Candle]) -> Vec<Decimal> {
    candles
        .windows(2)
        .map(|pair| pair[1].true_range(pair[0].close))
        .collect()
}

/// Mean of the trailing `window` true ranges, `None` when fewer are available.
pub fn average_true_range(true_ranges: &[Decimal], window: usize) -> Option<Decimal> {
    if window == 0 || true_ranges.len() < window {
        return None;
    }
    mean(&true_ranges[true_ranges.len() - window..])
}

fn extreme<V, B>(candles: &[Candle], value: V, better: B) -> Option<Extreme>
where
    V: Fn(&Candle) -> Option<Decimal>,
    B: Fn(Decimal, Decimal) -> bool,
{
    candles
        .iter()
        .filter_map(|c| {
            value(c).map(|v| Extreme {
                value: v,
                open_time: c.open_time,
            })
        })
        .reduce(|best, next| if better(next.value, best.value) { next } else { best })
}

fn pump_percentiles(pumps: &[Decimal]) -> BTreeMap<u8, Option<Decimal>> {
    let mut sorted = pumps.to_vec();
    sorted.sort();
    PUMP_PERCENTILES
        .iter()
        .map(|&label| (label, percentile_linear(&sorted, Decimal::from(label))))
        .collect()
}

fn summarize(values: &[Decimal]) -> Option<MoveSummary> {
    Some(MoveSummary {
        count: values.len(),
        mean: mean(values)?,
        std_dev: sample_std_dev(values),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn candle(day: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            open_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::days(day),
            open,
            high,
            low,
            close,
            volume: dec!(1000),
            turnover: dec!(100000),
        }
    }

    fn flat(count: usize, price: Decimal) -> Vec<Candle> {
        (0..count)
            .map(|i| candle(i as i64, price, price, price, price))
            .collect()
    }

    /// Deterministic choppy series around 100.
    fn choppy(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let step = Decimal::from((i * 37 % 23) as i64 - 11);
                let open = dec!(100) + step;
                let close = open + Decimal::from((i * 13 % 7) as i64 - 3);
                let high = open.max(close) + Decimal::from((i % 5) as i64 + 1);
                let low = open.min(close) - Decimal::from((i % 3) as i64 + 1);
                candle(i as i64, open, high, low, close)
            })
            .collect()
    }

    fn engine(min_candles: usize) -> MetricsEngine {
        MetricsEngine::new(MetricsConfig::new(min_candles, 1000).unwrap())
    }

    #[test]
    fn test_insufficient_data() {
        let candles = flat(28, dec!(10));
        let err = MetricsEngine::default()
            .compute("BTCUSDT", MarketCategory::Linear, &candles)
            .unwrap_err();
        assert_eq!(
            err,
            AnalyticsError::InsufficientData {
                required: 29,
                available: 28
            }
        );
    }

    #[test]
    fn test_empty_sequence_is_insufficient() {
        let err = engine(2)
            .compute("BTCUSDT", MarketCategory::Linear, &[])
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData { available: 0, .. }));
    }

    #[test]
    fn test_three_candle_example() {
        let candles = vec![
            candle(0, dec!(100), dec!(105), dec!(98), dec!(102)),
            candle(1, dec!(102), dec!(110), dec!(100), dec!(108)),
            candle(2, dec!(108), dec!(109), dec!(103), dec!(104)),
        ];
        let result = engine(3)
            .compute("PEPEUSDT", MarketCategory::Linear, &candles)
            .unwrap();

        let pump = result.max_intraday_pump.unwrap();
        assert_eq!(pump.value, dec!(8) / dec!(102));
        assert_eq!(pump.open_time, candles[1].open_time);
        assert!((pump.value - dec!(0.0784)).abs() < dec!(0.0001));

        let dump = result.max_intraday_dump.unwrap();
        assert_eq!(dump.value, dec!(-5) / dec!(108));
        assert_eq!(dump.open_time, candles[2].open_time);

        assert_eq!(result.max_daily_surge, Some(dec!(6) / dec!(102)));
        assert_eq!(result.max_daily_crash, Some(dec!(-4) / dec!(108)));
        assert!(result.daily_volatility.is_some());
        assert_eq!(result.weekly_volatility, None);
        assert_eq!(result.atr14, None);
        assert_eq!(result.atr_relative, None);
        assert_eq!(result.candle_count, 3);
        assert_eq!(result.last_close, dec!(104));
    }

    #[test]
    fn test_constant_prices_have_zero_volatility() {
        let result = MetricsEngine::default()
            .compute("USDCUSDT", MarketCategory::Spot, &flat(40, dec!(1.0002)))
            .unwrap();

        assert_eq!(result.daily_volatility, Some(Decimal::ZERO));
        assert_eq!(result.weekly_volatility, Some(Decimal::ZERO));
        assert_eq!(result.max_daily_surge, Some(Decimal::ZERO));
        assert_eq!(result.max_daily_crash, Some(Decimal::ZERO));
        assert_eq!(result.atr14, Some(Decimal::ZERO));
        assert_eq!(result.atr28, Some(Decimal::ZERO));
        assert_eq!(result.atr_relative, Some(Decimal::ZERO));
        assert_eq!(result.pump_percentile(99), Some(Decimal::ZERO));
    }

    #[test]
    fn test_atr_bounds_and_relative() {
        let candles = choppy(60);
        let result = MetricsEngine::default()
            .compute("ETHUSDT", MarketCategory::Linear, &candles)
            .unwrap();

        let trs = true_ranges(&candles);
        let max_tr = trs.iter().copied().max().unwrap();
        let atr14 = result.atr14.unwrap();
        let atr28 = result.atr28.unwrap();

        assert!(atr14 >= Decimal::ZERO);
        assert!(atr28 >= Decimal::ZERO);
        assert!(atr14 <= max_tr);
        assert!(atr28 <= max_tr);
        assert_eq!(result.atr_relative, Some(atr14 / result.last_close));
    }

    #[test]
    fn test_atr_constant_range() {
        // every candle spans 2 with no gaps, so every TR is 2
        let candles: Vec<Candle> = (0..16)
            .map(|i| candle(i, dec!(50), dec!(51), dec!(49), dec!(50)))
            .collect();
        let result = engine(16)
            .compute("SOLUSDT", MarketCategory::Linear, &candles)
            .unwrap();

        assert_eq!(result.atr14, Some(dec!(2)));
        assert_eq!(result.atr28, None);
        assert_eq!(result.atr_relative, Some(dec!(0.04)));
        assert!(result.unavailable_fields().contains(&"atr28".to_string()));
        assert!(!result.unavailable_fields().contains(&"atr14".to_string()));
    }

    #[test]
    fn test_first_candle_has_no_true_range() {
        let candles = choppy(5);
        assert_eq!(true_ranges(&candles).len(), 4);
        assert_eq!(average_true_range(&[dec!(1), dec!(3)], 2), Some(dec!(2)));
        assert_eq!(average_true_range(&[dec!(1)], 2), None);
    }

    #[test]
    fn test_percentiles_non_decreasing() {
        let result = MetricsEngine::default()
            .compute("DOGEUSDT", MarketCategory::Linear, &choppy(90))
            .unwrap();

        let values: Vec<Decimal> = PUMP_PERCENTILES
            .iter()
            .map(|label| result.pump_percentile(*label).unwrap())
            .collect();
        for pair in values.windows(2) {
            assert!(pair[0] <= pair[1], "{:?}", values);
        }
    }

    #[test]
    fn test_percentiles_interpolate_linearly() {
        // pumps 0.01 .. 0.05
        let candles: Vec<Candle> = (0..5)
            .map(|i| {
                let high = dec!(100) + Decimal::from(i + 1);
                candle(i, dec!(100), high, dec!(99), dec!(100))
            })
            .collect();
        let result = engine(5)
            .compute("XRPUSDT", MarketCategory::Linear, &candles)
            .unwrap();

        assert_eq!(result.pump_percentile(75), Some(dec!(0.04)));
        assert_eq!(result.pump_percentile(80), Some(dec!(0.042)));
        assert_eq!(result.pump_percentile(99), Some(dec!(0.0496)));
    }

    #[test]
    fn test_weekly_closes_step_back_from_latest() {
        let candles: Vec<Candle> = (0..15)
            .map(|i| {
                let p = Decimal::from(i + 1);
                candle(i, p, p, p, p)
            })
            .collect();
        assert_eq!(weekly_closes(&candles), vec![dec!(1), dec!(8), dec!(15)]);
        assert_eq!(weekly_closes(&candles[1..]), vec![dec!(8), dec!(15)]);
    }

    #[test]
    fn test_weekly_volatility_needs_two_weekly_returns() {
        let with_14 = engine(14)
            .compute("BTCUSDT", MarketCategory::Linear, &choppy(14))
            .unwrap();
        assert_eq!(with_14.weekly_volatility, None);

        let with_15 = engine(15)
            .compute("BTCUSDT", MarketCategory::Linear, &choppy(15))
            .unwrap();
        assert!(with_15.weekly_volatility.is_some());
    }

    #[test]
    fn test_non_positive_close_skipped() {
        let closes = [dec!(1), dec!(2), dec!(0), dec!(4), dec!(8)];
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| candle(i as i64, dec!(1), dec!(9), dec!(0), *c))
            .collect();

        // (1,2) and (4,8) survive, both ln 2
        assert_eq!(daily_log_returns(&candles).len(), 2);
        let result = engine(5)
            .compute("LUNAUSDT", MarketCategory::Spot, &candles)
            .unwrap();
        assert_eq!(result.daily_volatility, Some(Decimal::ZERO));
        assert_eq!(result.max_daily_crash, Some(dec!(-1)));
        assert_eq!(result.max_daily_surge, Some(dec!(1)));
    }

    #[test]
    fn test_move_summaries() {
        let result = engine(5)
            .compute("BNBUSDT", MarketCategory::Linear, &choppy(5))
            .unwrap();
        let pump = result.pump_summary.unwrap();
        let dump = result.dump_summary.unwrap();
        assert_eq!(pump.count, 5);
        assert!(pump.mean > Decimal::ZERO);
        assert!(dump.mean < Decimal::ZERO);
        assert!(pump.std_dev.is_some());
    }
}
