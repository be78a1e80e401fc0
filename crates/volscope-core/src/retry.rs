//! Retry with exponential backoff for transient upstream failures.
//!
//! Retries belong to the fetch boundary only; the analytics engine and the
//! scanner never retry on their own.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Non-success HTTP status returned by an upstream API.
#[derive(Debug, Error)]
#[error("HTTP status {0}")]
pub struct HttpStatusError(pub u16);

impl HttpStatusError {
    pub fn is_transient(&self) -> bool {
        self.0 == 429 || (500..600).contains(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retry attempts after the initial one
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff sleep
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            ..Self::default()
        }
    }

    /// Reads `RETRY_MAX_ATTEMPTS` and `RETRY_BASE_DELAY_MS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_retries = std::env::var("RETRY_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_retries);
        let base_delay_ms = std::env::var("RETRY_BASE_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.base_delay_ms);

        Self {
            max_retries,
            base_delay_ms,
            ..defaults
        }
    }

    /// Backoff before retry number `attempt` (0-based): base * 2^attempt, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Whether an error looks transient: rate limiting, upstream 5xx, timeouts
/// or dropped connections.
pub fn is_transient(err: &anyhow::Error) -> bool {
    if let Some(status) = err.downcast_ref::<HttpStatusError>() {
        return status.is_transient();
    }
    let msg = err.to_string();
    msg.contains("429")
        || msg.contains("Too Many Requests")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
        || msg.contains("timed out")
        || msg.contains("error sending request")
        || msg.contains("connection reset")
}

/// Runs `request_fn`, retrying transient failures with exponential backoff.
pub async fn execute_with_retry<F, Fut, T>(config: &RetryConfig, mut request_fn: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match request_fn().await {
            Ok(data) => return Ok(data),
            Err(e) if attempt < config.max_retries && is_transient(&e) => {
                let delay = config.delay_for(attempt);
                tracing::warn!(
                    "Transient upstream failure (attempt {}/{}), retrying in {}ms: {}",
                    attempt + 1,
                    config.max_retries + 1,
                    delay.as_millis(),
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let config = RetryConfig::default();
        let result = execute_with_retry(&config, || async { Ok::<_, anyhow::Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let config = RetryConfig::new(3, 5);
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = execute_with_retry(&config, || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow::Error::new(HttpStatusError(503)))
                } else {
                    Ok::<_, anyhow::Error>("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let config = RetryConfig::new(2, 5);
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = execute_with_retry(&config, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("429 Too Many Requests"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let config = RetryConfig::new(5, 5);
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = execute_with_retry(&config, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::Error::new(HttpStatusError(404)))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
        };
        assert_eq!(config.delay_for(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for(2), Duration::from_millis(4000));
        assert_eq!(config.delay_for(3), Duration::from_millis(5000));
        assert_eq!(config.delay_for(70), Duration::from_millis(5000));
    }
}
