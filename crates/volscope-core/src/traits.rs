use crate::types::*;
use async_trait::async_trait;

/// Pull interface over a source of daily candles.
#[async_trait]
pub trait ICandleSource: Send + Sync {
    /// Name of the backing exchange.
    fn get_name(&self) -> &str;

    /// Returns up to `limit` of the most recent daily candles for `symbol`,
    /// ordered oldest first. `limit` is capped at 1000 by implementations.
    async fn fetch_candles(
        &self,
        symbol: &str,
        market: MarketCategory,
        limit: u32,
    ) -> anyhow::Result<Vec<Candle>>;
}

/// Pull interface over current funding rates.
#[async_trait]
pub trait IFundingSource: Send + Sync {
    /// Current funding rate for a single instrument.
    async fn fetch_funding(
        &self,
        instrument: &str,
        market: MarketCategory,
    ) -> anyhow::Result<FundingSnapshot>;

    /// Current funding rates for every instrument of a market in one request.
    async fn fetch_all_funding(&self, market: MarketCategory)
        -> anyhow::Result<Vec<FundingSnapshot>>;

    /// Every listed instrument of a market.
    async fn list_instruments(&self, market: MarketCategory) -> anyhow::Result<Vec<Instrument>>;
}

/// Symbol listing lookup.
#[async_trait]
pub trait IMarketLookup: Send + Sync {
    /// Returns the first market category (linear, inverse, spot) the symbol
    /// is listed on, or `None` when it is not listed anywhere.
    async fn find_market(&self, symbol: &str) -> anyhow::Result<Option<MarketCategory>>;
}
