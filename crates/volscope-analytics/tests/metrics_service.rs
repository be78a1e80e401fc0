use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use volscope_analytics::{MetricsConfig, MetricsService, PUMP_PERCENTILES};
use volscope_core::{AnalyticsError, Candle, ICandleSource, MarketCategory};

struct MockCandleSource {
    candles: Vec<Candle>,
}

#[async_trait]
impl ICandleSource for MockCandleSource {
    fn get_name(&self) -> &str {
        "mock"
    }

    async fn fetch_candles(
        &self,
        _symbol: &str,
        _market: MarketCategory,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let skip = self.candles.len().saturating_sub(limit as usize);
        Ok(self.candles[skip..].to_vec())
    }
}

struct FailingCandleSource;

#[async_trait]
impl ICandleSource for FailingCandleSource {
    fn get_name(&self) -> &str {
        "failing"
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        _market: MarketCategory,
        _limit: u32,
    ) -> Result<Vec<Candle>> {
        anyhow::bail!("Bybit API error 10001: symbol {} invalid", symbol)
    }
}

fn history(days: i64) -> Vec<Candle> {
    let start = Utc.timestamp_opt(1_690_000_000, 0).unwrap();
    (0..days)
        .map(|day| {
            let open = dec!(1.5) + Decimal::from(day % 9) / dec!(100);
            let close = open + Decimal::from(day % 4 - 2) / dec!(100);
            Candle {
                open_time: start + Duration::days(day),
                open,
                high: open.max(close) + dec!(0.03),
                low: open.min(close) - dec!(0.02),
                close,
                volume: dec!(250000),
                turnover: dec!(375000),
            }
        })
        .collect()
}

#[tokio::test]
async fn test_analyze_full_history() {
    let source = Arc::new(MockCandleSource {
        candles: history(120),
    });
    let service = MetricsService::new(source, MetricsConfig::default());

    let result = service
        .analyze("ARBUSDT", MarketCategory::Linear)
        .await
        .unwrap();

    assert_eq!(result.symbol, "ARBUSDT");
    assert_eq!(result.candle_count, 120);
    assert!(result.unavailable_fields().is_empty());
    assert!(result.daily_volatility.unwrap() > Decimal::ZERO);
    assert!(result.weekly_volatility.unwrap() > Decimal::ZERO);
    assert!(result.first_open_time < result.last_open_time);
}

#[tokio::test]
async fn test_analyze_respects_max_candles() {
    let source = Arc::new(MockCandleSource {
        candles: history(120),
    });
    let service = MetricsService::new(source, MetricsConfig::new(29, 60).unwrap());

    let result = service
        .analyze("ARBUSDT", MarketCategory::Linear)
        .await
        .unwrap();
    assert_eq!(result.candle_count, 60);
}

#[tokio::test]
async fn test_analyze_new_listing_is_insufficient() {
    let source = Arc::new(MockCandleSource {
        candles: history(10),
    });
    let service = MetricsService::new(source, MetricsConfig::default());

    let err = service
        .analyze("NEWUSDT", MarketCategory::Linear)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AnalyticsError::InsufficientData {
            required: 29,
            available: 10
        }
    );
}

#[tokio::test]
async fn test_analyze_maps_upstream_failure() {
    let service = MetricsService::new(Arc::new(FailingCandleSource), MetricsConfig::default());

    let err = service
        .analyze("BADUSDT", MarketCategory::Spot)
        .await
        .unwrap_err();
    match err {
        AnalyticsError::DataUnavailable { symbol, reason } => {
            assert_eq!(symbol, "BADUSDT");
            assert!(reason.contains("10001"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_analyze_empty_history_is_unavailable() {
    let service = MetricsService::new(
        Arc::new(MockCandleSource { candles: vec![] }),
        MetricsConfig::default(),
    );
    let err = service
        .analyze("GHOSTUSDT", MarketCategory::Linear)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::DataUnavailable { .. }));
}

#[tokio::test]
async fn test_result_serializes_for_reports() {
    let source = Arc::new(MockCandleSource {
        candles: history(40),
    });
    let result = MetricsService::new(source, MetricsConfig::default())
        .analyze("ARBUSDT", MarketCategory::Linear)
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["market"], "linear");
    for label in PUMP_PERCENTILES {
        assert!(json["pump_percentiles"][label.to_string()].is_string());
    }
    assert!(json["max_intraday_pump"]["open_time"].is_string());
}
