use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use volscope_core::{AnalyticsError, MarketCategory};

/// Funding rate at or below which an instrument is reported.
pub const DEFAULT_FUNDING_THRESHOLD: Decimal = dec!(-0.015);

/// Time between two scans of the same subscriber.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(1200);

/// Delay before a freshly activated subscriber's first scan.
pub const DEFAULT_FIRST_DELAY: Duration = Duration::from_secs(10);

/// Per-subscriber scan settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub threshold: Decimal,
    pub interval: Duration,
    pub market: MarketCategory,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FUNDING_THRESHOLD,
            interval: DEFAULT_SCAN_INTERVAL,
            market: MarketCategory::Linear,
        }
    }
}

impl Subscription {
    pub fn new(
        threshold: Decimal,
        interval: Duration,
        market: MarketCategory,
    ) -> Result<Self, AnalyticsError> {
        let subscription = Self {
            threshold,
            interval,
            market,
        };
        subscription.validate()?;
        Ok(subscription)
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.interval.is_zero() {
            return Err(AnalyticsError::InvalidConfig(
                "scan interval must be greater than zero".to_string(),
            ));
        }
        if !self.market.has_funding() {
            return Err(AnalyticsError::InvalidConfig(format!(
                "{} instruments have no funding rate",
                self.market
            )));
        }
        Ok(())
    }
}

/// Process-wide scheduler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub first_delay: Duration,
    /// Scans allowed to run at once across all subscribers
    pub max_concurrent_scans: usize,
    /// Re-alert an already reported instrument once its rate has fallen at
    /// least this much below the rate of its last alert
    pub realert_step: Option<Decimal>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            first_delay: DEFAULT_FIRST_DELAY,
            max_concurrent_scans: 4,
            realert_step: None,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.max_concurrent_scans == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "max_concurrent_scans must be at least 1".to_string(),
            ));
        }
        if let Some(step) = self.realert_step {
            if step <= Decimal::ZERO {
                return Err(AnalyticsError::InvalidConfig(format!(
                    "realert_step must be positive, got {}",
                    step
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_defaults() {
        let sub = Subscription::default();
        assert_eq!(sub.threshold, dec!(-0.015));
        assert_eq!(sub.interval, Duration::from_secs(1200));
        assert!(sub.validate().is_ok());
    }

    #[test]
    fn test_subscription_rejects_spot_and_zero_interval() {
        assert!(Subscription::new(dec!(-0.01), Duration::ZERO, MarketCategory::Linear).is_err());
        assert!(
            Subscription::new(dec!(-0.01), Duration::from_secs(60), MarketCategory::Spot).is_err()
        );
    }

    #[test]
    fn test_scheduler_config_validation() {
        assert!(SchedulerConfig::default().validate().is_ok());
        let config = SchedulerConfig {
            realert_step: Some(Decimal::ZERO),
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
