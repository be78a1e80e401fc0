use chrono::Utc;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use volscope_core::{AnalyticsError, FundingSnapshot, IFundingSource, MarketCategory};

use crate::types::{ScanReport, ScannerConfig};

/// Default size of the top negative funding list.
pub const DEFAULT_TOP_LIMIT: usize = 10;

/// Polls current funding rates and filters them against a threshold.
///
/// The scanner never retries and never touches alert state; retries belong
/// to the funding source and dedup belongs to the subscriber registry.
#[derive(Clone)]
pub struct FundingScanner {
    source: Arc<dyn IFundingSource>,
    config: ScannerConfig,
}

impl FundingScanner {
    pub fn new(source: Arc<dyn IFundingSource>, config: ScannerConfig) -> Self {
        Self { source, config }
    }

    /// Fetches the funding rate of every instrument and keeps those at or
    /// below `threshold`, most negative first.
    ///
    /// Instruments whose fetch fails are skipped and counted. The scan only
    /// fails, with `ScanUnavailable`, when not a single rate was fetched.
    pub async fn scan(
        &self,
        instruments: &[String],
        market: MarketCategory,
        threshold: Decimal,
    ) -> Result<ScanReport, AnalyticsError> {
        let start = Instant::now();
        let unique: BTreeSet<String> = instruments.iter().cloned().collect();
        let attempted = unique.len();

        let results: Vec<_> = stream::iter(unique)
            .map(|instrument| {
                let source = self.source.clone();
                async move {
                    let result = source.fetch_funding(&instrument, market).await;
                    (instrument, result)
                }
            })
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut snapshots = Vec::with_capacity(results.len());
        let mut failed = 0;
        for (instrument, result) in results {
            match result {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    failed += 1;
                    tracing::warn!("Skipping {} ({}): {:#}", instrument, market, e);
                }
            }
        }

        if snapshots.is_empty() {
            tracing::warn!(
                "Funding scan on {} failed: {} of {} fetches failed",
                market,
                failed,
                attempted
            );
            return Err(AnalyticsError::ScanUnavailable { attempted, failed });
        }

        let fetched = snapshots.len();
        let mut hits: Vec<FundingSnapshot> = snapshots
            .into_iter()
            .filter(|s| s.rate <= threshold)
            .collect();
        sort_by_rate(&mut hits);

        tracing::debug!(
            "Scanned {} {} instruments in {:.2?}: {} fetched, {} failed, {} at or below {}",
            attempted,
            market,
            start.elapsed(),
            fetched,
            failed,
            hits.len(),
            threshold
        );

        Ok(ScanReport {
            market,
            threshold,
            hits,
            attempted,
            fetched,
            failed,
            completed_at: Utc::now(),
        })
    }

    /// The `limit` most negative funding rates of a market from a single
    /// bulk snapshot. Non-negative rates are never included.
    pub async fn top_negative(
        &self,
        market: MarketCategory,
        limit: usize,
    ) -> Result<Vec<FundingSnapshot>, AnalyticsError> {
        let snapshots = self
            .source
            .fetch_all_funding(market)
            .await
            .map_err(|e| AnalyticsError::data_unavailable(market.to_string(), format!("{:#}", e)))?;

        let mut negative: Vec<FundingSnapshot> = snapshots
            .into_iter()
            .filter(|s| s.rate < Decimal::ZERO)
            .collect();
        sort_by_rate(&mut negative);
        negative.truncate(limit);
        Ok(negative)
    }
}

fn sort_by_rate(snapshots: &mut [FundingSnapshot]) {
    snapshots.sort_by(|a, b| {
        a.rate
            .cmp(&b.rate)
            .then_with(|| a.instrument.cmp(&b.instrument))
    });
}
