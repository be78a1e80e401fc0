use thiserror::Error;

/// Bybit API rate-limit return code ("Too many visits").
pub const RET_CODE_RATE_LIMIT: i32 = 10006;

#[derive(Debug, Error)]
pub enum BybitError {
    #[error("Bybit API error: code {code} - {message}")]
    Api { code: i32, message: String },

    #[error("Malformed kline row: {0}")]
    MalformedKline(String),

    #[error("Ticker for {0} not found")]
    TickerNotFound(String),

    #[error("No funding rate reported for {0}")]
    NoFunding(String),

    #[error("Market {0} has no funding rates")]
    FundingNotSupported(String),
}
