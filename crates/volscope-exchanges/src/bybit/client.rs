use crate::bybit::conversions::{candles_from_rows, funding_from_ticker, instrument_from_raw};
use crate::bybit::error::{BybitError, RET_CODE_RATE_LIMIT};
use crate::bybit::types::*;
use crate::cache::ListingCache;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::time::Duration;
use volscope_core::retry::{execute_with_retry, HttpStatusError, RetryConfig};
use volscope_core::types::*;
use volscope_core::{ICandleSource, IFundingSource, IMarketLookup, RequestBudget};

const BASE_URL: &str = "https://api.bybit.com";

/// Largest page the kline and instruments endpoints return.
pub const MAX_PAGE_LIMIT: u32 = 1000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A client for Bybit v5 public market data.
///
/// Clones share the HTTP connection pool, the request budget and the
/// listing cache, so one client can be handed to every scan task.
#[derive(Clone)]
pub struct BybitClient {
    http: reqwest::Client,
    base_url: String,
    budget: RequestBudget,
    retry: RetryConfig,
    listings: ListingCache,
}

impl BybitClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            budget: RequestBudget::bybit(),
            retry: RetryConfig::from_env(),
            listings: ListingCache::new(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        execute_with_retry(&self.retry, || self.get_once(&url, query)).await
    }

    async fn get_once<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.budget.acquire().await;
        tracing::debug!("GET {} {:?}", url, query);

        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::Error::new(HttpStatusError(status.as_u16()))
                .context(format!("GET request to {} failed", url)));
        }

        let wrapper: BybitResponse<T> = response.json().await?;
        match wrapper.ret_code {
            0 => Ok(wrapper.result),
            RET_CODE_RATE_LIMIT => Err(anyhow::Error::new(HttpStatusError(429))
                .context(format!("Bybit rate limit: {}", wrapper.ret_msg))),
            code => Err(BybitError::Api {
                code,
                message: wrapper.ret_msg,
            }
            .into()),
        }
    }

    async fn tickers(&self, market: MarketCategory, symbol: Option<&str>) -> Result<TickersResult> {
        let mut query = vec![("category", market.as_str().to_string())];
        if let Some(symbol) = symbol {
            query.push(("symbol", symbol.to_string()));
        }
        self.get("/v5/market/tickers", &query).await
    }

    async fn listed_symbols(&self, market: MarketCategory) -> Result<HashSet<String>> {
        Ok(self
            .list_instruments(market)
            .await?
            .into_iter()
            .map(|i| i.symbol)
            .collect())
    }
}

impl Default for BybitClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ICandleSource for BybitClient {
    fn get_name(&self) -> &str {
        "bybit"
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        market: MarketCategory,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let query = [
            ("category", market.as_str().to_string()),
            ("symbol", symbol.to_string()),
            ("interval", "D".to_string()),
            ("limit", limit.to_string()),
        ];

        let result: KlinesResult = self
            .get("/v5/market/kline", &query)
            .await
            .with_context(|| format!("fetching daily klines for {} ({})", symbol, market))?;

        let candles = candles_from_rows(&result.list)?;
        tracing::debug!(
            "Fetched {} daily candles for {} ({})",
            candles.len(),
            symbol,
            market
        );
        Ok(candles)
    }
}

#[async_trait]
impl IFundingSource for BybitClient {
    async fn fetch_funding(&self, instrument: &str, market: MarketCategory) -> Result<FundingSnapshot> {
        if !market.has_funding() {
            return Err(BybitError::FundingNotSupported(market.to_string()).into());
        }

        let result = self.tickers(market, Some(instrument)).await?;
        let ticker = result
            .list
            .iter()
            .find(|t| t.symbol == instrument)
            .ok_or_else(|| BybitError::TickerNotFound(instrument.to_string()))?;

        funding_from_ticker(ticker, market, Utc::now())?
            .ok_or_else(|| BybitError::NoFunding(instrument.to_string()).into())
    }

    async fn fetch_all_funding(&self, market: MarketCategory) -> Result<Vec<FundingSnapshot>> {
        if !market.has_funding() {
            return Err(BybitError::FundingNotSupported(market.to_string()).into());
        }

        let result = self.tickers(market, None).await?;
        let observed_at = Utc::now();

        let snapshots = result
            .list
            .iter()
            .filter_map(|ticker| match funding_from_ticker(ticker, market, observed_at) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!("Skipping unparsable funding rate for {}: {}", ticker.symbol, e);
                    None
                }
            })
            .collect();
        Ok(snapshots)
    }

    async fn list_instruments(&self, market: MarketCategory) -> Result<Vec<Instrument>> {
        let mut instruments = Vec::new();
        let mut cursor = String::new();

        // Bybit pages instruments-info; follow nextPageCursor until exhausted
        loop {
            let mut query = vec![
                ("category", market.as_str().to_string()),
                ("limit", MAX_PAGE_LIMIT.to_string()),
            ];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.clone()));
            }

            let page: InstrumentsResult = self.get("/v5/market/instruments-info", &query).await?;
            instruments.extend(
                page.list
                    .into_iter()
                    .map(|raw| instrument_from_raw(raw, market)),
            );

            if page.next_page_cursor.is_empty() || page.next_page_cursor == cursor {
                break;
            }
            cursor = page.next_page_cursor;
        }

        tracing::debug!("Listed {} {} instruments", instruments.len(), market);
        Ok(instruments)
    }
}

#[async_trait]
impl IMarketLookup for BybitClient {
    async fn find_market(&self, symbol: &str) -> Result<Option<MarketCategory>> {
        for market in MarketCategory::SEARCH_ORDER {
            let found = self
                .listings
                .contains_or_load(market, symbol, || self.listed_symbols(market))
                .await;

            match found {
                Ok(true) => {
                    tracing::debug!("Found {} in {}", symbol, market);
                    return Ok(Some(market));
                }
                Ok(false) => continue,
                Err(e) => {
                    // One failing category should not hide a listing in the next
                    tracing::warn!("Failed to check {} listings for {}: {}", market, symbol, e);
                    continue;
                }
            }
        }

        tracing::info!("Symbol {} not listed on Bybit", symbol);
        Ok(None)
    }
}
