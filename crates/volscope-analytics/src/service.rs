use std::sync::Arc;
use volscope_core::{AnalyticsError, ICandleSource, MarketCategory};

use crate::metrics::{IMetricsEngine, MetricsEngine};
use crate::types::{MetricsConfig, MetricsResult};

/// On-demand metrics: fetch the candle history, then compute.
///
/// Upstream failures surface as `DataUnavailable`; a short history surfaces
/// as `InsufficientData` from the engine.
#[derive(Clone)]
pub struct MetricsService {
    source: Arc<dyn ICandleSource>,
    engine: Arc<dyn IMetricsEngine>,
    max_candles: u32,
}

impl MetricsService {
    pub fn new(source: Arc<dyn ICandleSource>, config: MetricsConfig) -> Self {
        let max_candles = config.max_candles;
        Self {
            source,
            engine: Arc::new(MetricsEngine::new(config)),
            max_candles,
        }
    }

    pub async fn analyze(
        &self,
        symbol: &str,
        market: MarketCategory,
    ) -> Result<MetricsResult, AnalyticsError> {
        tracing::info!(
            "Analyzing {} ({}) over up to {} daily candles from {}",
            symbol,
            market,
            self.max_candles,
            self.source.get_name()
        );

        let candles = self
            .source
            .fetch_candles(symbol, market, self.max_candles)
            .await
            .map_err(|e| AnalyticsError::data_unavailable(symbol, format!("{:#}", e)))?;

        if candles.is_empty() {
            return Err(AnalyticsError::data_unavailable(symbol, "no candles returned"));
        }

        self.engine.compute(symbol, market, &candles)
    }
}
