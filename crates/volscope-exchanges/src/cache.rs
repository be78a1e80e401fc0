use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use volscope_core::MarketCategory;

/// Per-category cache of listed symbols.
/// Each category is loaded once (OnceCell) and read concurrently (RwLock).
#[derive(Clone, Default)]
pub struct ListingCache {
    linear: Arc<OnceCell<RwLock<HashSet<String>>>>,
    inverse: Arc<OnceCell<RwLock<HashSet<String>>>>,
    spot: Arc<OnceCell<RwLock<HashSet<String>>>>,
}

impl ListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, market: MarketCategory) -> &OnceCell<RwLock<HashSet<String>>> {
        match market {
            MarketCategory::Linear => &self.linear,
            MarketCategory::Inverse => &self.inverse,
            MarketCategory::Spot => &self.spot,
        }
    }

    /// Store the listing for a category. No-op if it is already loaded.
    pub fn initialize(&self, market: MarketCategory, symbols: HashSet<String>) {
        let _ = self.slot(market).set(RwLock::new(symbols));
    }

    pub fn is_loaded(&self, market: MarketCategory) -> bool {
        self.slot(market).get().is_some()
    }

    /// `None` while the category has not been loaded yet.
    pub async fn contains(&self, market: MarketCategory, symbol: &str) -> Option<bool> {
        match self.slot(market).get() {
            Some(set) => Some(set.read().await.contains(symbol)),
            None => None,
        }
    }

    /// Check membership, loading the category with `load_fn` on first use.
    pub async fn contains_or_load<F, Fut>(
        &self,
        market: MarketCategory,
        symbol: &str,
        load_fn: F,
    ) -> anyhow::Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<HashSet<String>>>,
    {
        if let Some(found) = self.contains(market, symbol).await {
            return Ok(found);
        }

        let symbols = load_fn().await?;
        let found = symbols.contains(symbol);
        self.initialize(market, symbols);
        Ok(found)
    }
}
