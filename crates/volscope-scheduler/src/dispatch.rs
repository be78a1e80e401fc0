use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use crate::registry::SubscriberId;

/// One funding alert for one subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub subscriber_id: SubscriberId,
    pub instrument: String,
    pub rate: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl AlertEvent {
    /// Funding rate in percent, rounded to 4 decimal places.
    pub fn rate_pct(&self) -> Decimal {
        (self.rate * dec!(100)).round_dp(4)
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} funding rate {}% at {}",
            self.subscriber_id,
            self.instrument,
            self.rate_pct(),
            self.observed_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Delivery boundary for alerts. The scheduler calls `dispatch` once per
/// newly qualifying instrument; an alert that returns `Err` is offered again
/// on the next cycle.
#[async_trait]
pub trait IAlertSink: Send + Sync {
    async fn dispatch(&self, event: AlertEvent) -> anyhow::Result<()>;
}

/// Writes alerts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

#[async_trait]
impl IAlertSink for LogAlertSink {
    async fn dispatch(&self, event: AlertEvent) -> anyhow::Result<()> {
        tracing::warn!("Funding alert: {}", event);
        Ok(())
    }
}

/// Forwards alerts to a channel consumer.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: mpsc::Sender<AlertEvent>,
}

impl ChannelAlertSink {
    pub fn new(tx: mpsc::Sender<AlertEvent>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AlertEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl IAlertSink for ChannelAlertSink {
    async fn dispatch(&self, event: AlertEvent) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|e| anyhow::anyhow!("alert receiver dropped, lost alert for {}", e.0.instrument))
    }
}
