use crate::bybit::BybitClient;

pub const SUPPORTED_EXCHANGES: [&str; 1] = ["bybit"];

/// Returns a market data source by exchange name.
pub fn get_source(name: &str) -> anyhow::Result<BybitClient> {
    match name.to_lowercase().as_str() {
        "bybit" => Ok(BybitClient::new()),
        _ => anyhow::bail!(
            "Unsupported exchange: {}. Currently supported: {}",
            name,
            SUPPORTED_EXCHANGES.join(", ")
        ),
    }
}
