use serde::Deserialize;

// Bybit v5 response envelope; failed calls return an empty `result` object
#[derive(Debug, Deserialize, Clone)]
pub struct BybitResponse<T> {
    #[serde(rename = "retCode")]
    pub ret_code: i32,
    #[serde(rename = "retMsg")]
    pub ret_msg: String,
    pub result: T,
}

// For /v5/market/kline
#[derive(Debug, Deserialize, Clone)]
pub struct KlinesResult {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub list: Vec<Vec<String>>, // [startTime, open, high, low, close, volume, turnover], newest first
}

// For /v5/market/tickers
#[derive(Debug, Deserialize, Clone)]
pub struct TickersResult {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub list: Vec<BybitTicker>,
}

// Spot tickers carry no funding fields, so everything but the symbol is optional
#[derive(Debug, Deserialize, Clone)]
pub struct BybitTicker {
    pub symbol: String,
    #[serde(rename = "lastPrice", default)]
    pub last_price: String,
    #[serde(rename = "fundingRate", default)]
    pub funding_rate: String,
    #[serde(rename = "nextFundingTime", default)]
    pub next_funding_time: String,
}

// For /v5/market/instruments-info (paginated)
#[derive(Debug, Deserialize, Clone)]
pub struct InstrumentsResult {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub list: Vec<BybitInstrument>,
    #[serde(rename = "nextPageCursor", default)]
    pub next_page_cursor: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BybitInstrument {
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "baseCoin", default)]
    pub base_coin: String,
    #[serde(rename = "quoteCoin", default)]
    pub quote_coin: String,
}
