//! Shared request budget toward an upstream API.
//!
//! Every outbound request, no matter which subscriber scan or on-demand
//! command issued it, takes a slot from the same budget. The budget tracks
//! request timestamps in sliding windows and allows bursts up to each
//! window's limit before making callers wait.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A single window constraint (e.g. "120 requests per second").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    pub max_requests: usize,
    pub window: Duration,
}

impl WindowLimit {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn per_second(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(1))
    }

    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// Sliding-window request budget, cheap to clone and share.
///
/// # Example
/// ```rust
/// use volscope_core::{RequestBudget, WindowLimit};
///
/// #[tokio::main]
/// async fn main() {
///     let budget = RequestBudget::new(vec![WindowLimit::per_second(5)]);
///     let value = budget
///         .execute(|| async { Ok::<_, anyhow::Error>(42) })
///         .await
///         .unwrap();
///     assert_eq!(value, 42);
/// }
/// ```
#[derive(Clone)]
pub struct RequestBudget {
    limits: Vec<WindowLimit>,
    history: Arc<Mutex<Vec<VecDeque<Instant>>>>,
}

impl RequestBudget {
    pub fn new(limits: Vec<WindowLimit>) -> Self {
        let history = vec![VecDeque::new(); limits.len()];
        Self {
            limits,
            history: Arc::new(Mutex::new(history)),
        }
    }

    /// Bybit public market endpoints allow 600 requests per 5 seconds per IP.
    /// We stay well under that so several processes can share an address.
    pub fn bybit() -> Self {
        Self::new(vec![
            WindowLimit::per_second(50),
            WindowLimit::per_minute(2400),
        ])
    }

    /// No limits at all; for tests and offline sources.
    pub fn unlimited() -> Self {
        Self::new(vec![])
    }

    pub fn limits(&self) -> &[WindowLimit] {
        &self.limits
    }

    /// Waits until a request slot is free in every window, then records it.
    ///
    /// The lock is held while sleeping so that concurrent callers queue up
    /// in order instead of all waking at the same instant.
    pub async fn acquire(&self) {
        if self.limits.is_empty() {
            return;
        }

        let mut history = self.history.lock().await;
        loop {
            let now = Instant::now();
            let wait = self.wait_time(&mut history, now);
            if wait.is_zero() {
                for queue in history.iter_mut() {
                    queue.push_back(now);
                }
                return;
            }
            tracing::debug!("Request budget exhausted, waiting {}ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
    }

    /// Acquires a slot and runs the request.
    pub async fn execute<F, Fut, T>(&self, request_fn: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        self.acquire().await;
        request_fn().await
    }

    /// Number of requests still available in the tightest window right now.
    pub async fn remaining(&self) -> Option<usize> {
        let mut history = self.history.lock().await;
        let now = Instant::now();
        self.limits
            .iter()
            .enumerate()
            .map(|(i, limit)| {
                evict_expired(&mut history[i], limit.window, now);
                limit.max_requests.saturating_sub(history[i].len())
            })
            .min()
    }

    fn wait_time(&self, history: &mut [VecDeque<Instant>], now: Instant) -> Duration {
        let mut max_wait = Duration::ZERO;
        for (i, limit) in self.limits.iter().enumerate() {
            evict_expired(&mut history[i], limit.window, now);
            if history[i].len() < limit.max_requests {
                continue;
            }
            if let Some(oldest) = history[i].front() {
                let elapsed = now.duration_since(*oldest);
                if elapsed < limit.window {
                    max_wait = max_wait.max(limit.window - elapsed);
                }
            }
        }
        max_wait
    }
}

fn evict_expired(queue: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    while let Some(front) = queue.front() {
        if now.duration_since(*front) >= window {
            queue.pop_front();
        } else {
            break;
        }
    }
}
