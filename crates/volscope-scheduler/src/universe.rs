use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use volscope_core::{IFundingSource, MarketCategory};

/// The set of instruments every subscriber scan covers.
///
/// Shared by all scans; refreshed from the exchange listing or replaced
/// wholesale from a symbols file.
#[derive(Clone, Default)]
pub struct InstrumentUniverse {
    symbols: Arc<RwLock<Vec<String>>>,
}

impl InstrumentUniverse {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols: Arc::new(RwLock::new(dedup_sorted(symbols))),
        }
    }

    /// Replaces the tracked instruments and returns the new count.
    pub async fn replace(&self, symbols: Vec<String>) -> usize {
        let symbols = dedup_sorted(symbols);
        let count = symbols.len();
        *self.symbols.write().await = symbols;
        count
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.symbols.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.symbols.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.symbols.read().await.is_empty()
    }

    /// Reloads the universe with every instrument currently trading on `market`.
    /// On failure the previous universe is kept.
    pub async fn refresh(
        &self,
        source: &dyn IFundingSource,
        market: MarketCategory,
    ) -> anyhow::Result<usize> {
        let listed = source.list_instruments(market).await?;
        let trading: Vec<String> = listed
            .into_iter()
            .filter(|i| i.trading)
            .map(|i| i.symbol)
            .collect();
        let count = self.replace(trading).await;
        tracing::info!("Tracking {} trading {} instruments", count, market);
        Ok(count)
    }
}

fn dedup_sorted(symbols: Vec<String>) -> Vec<String> {
    symbols
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
