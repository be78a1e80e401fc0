use thiserror::Error;

/// Errors surfaced by the analytics engine, the funding scanner and the
/// on-demand metrics service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    /// Not enough candles to produce a result at all.
    #[error("insufficient data: {required} candles required, {available} available")]
    InsufficientData { required: usize, available: usize },

    /// Upstream fetch failed for an on-demand request.
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Not a single funding rate could be fetched during a scan cycle.
    #[error("scan unavailable: {failed} of {attempted} funding fetches failed")]
    ScanUnavailable { attempted: usize, failed: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalyticsError {
    pub fn data_unavailable(symbol: impl Into<String>, err: impl std::fmt::Display) -> Self {
        AnalyticsError::DataUnavailable {
            symbol: symbol.into(),
            reason: err.to_string(),
        }
    }
}
