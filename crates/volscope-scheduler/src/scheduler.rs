use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use volscope_analytics::FundingScanner;
use volscope_core::AnalyticsError;

use crate::config::{SchedulerConfig, Subscription};
use crate::dispatch::{AlertEvent, IAlertSink};
use crate::registry::{Activation, Completion, CycleTicket, SubscriberId, SubscriberRegistry};
use crate::universe::InstrumentUniverse;

/// Result of one scan cycle for one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Not active, or the previous scan is still running
    Skipped,
    /// Deactivated or re-activated while scanning or dispatching
    Discarded,
    Failed(AnalyticsError),
    Completed { hits: usize, dispatched: usize },
}

struct TimerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct SchedulerInner {
    registry: SubscriberRegistry,
    scanner: FundingScanner,
    universe: InstrumentUniverse,
    sink: Arc<dyn IAlertSink>,
    timers: DashMap<SubscriberId, TimerHandle>,
    scan_permits: Semaphore,
    config: SchedulerConfig,
}

/// Drives periodic funding scans for every active subscriber.
///
/// Each subscriber owns one timer task in the timer table. Scans of one
/// subscriber never overlap; scans of different subscribers run
/// concurrently up to `max_concurrent_scans`, all sharing the scanner's
/// funding source and its request budget.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        scanner: FundingScanner,
        universe: InstrumentUniverse,
        sink: Arc<dyn IAlertSink>,
        config: SchedulerConfig,
    ) -> Result<Self, AnalyticsError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(SchedulerInner {
                registry: SubscriberRegistry::new(config.realert_step),
                scanner,
                universe,
                sink,
                timers: DashMap::new(),
                scan_permits: Semaphore::new(config.max_concurrent_scans),
                config,
            }),
        })
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.inner.registry
    }

    pub fn is_active(&self, subscriber_id: &str) -> bool {
        self.inner.registry.is_active(subscriber_id)
    }

    pub fn subscribers(&self) -> Vec<SubscriberId> {
        self.inner.registry.subscribers()
    }

    /// Starts periodic scans for a subscriber. Activating an active
    /// subscriber updates its settings and keeps its alert state; the timer
    /// is only restarted when the interval changed.
    pub fn activate(
        &self,
        subscriber_id: &str,
        subscription: Subscription,
    ) -> Result<Activation, AnalyticsError> {
        subscription.validate()?;
        let activation = self.inner.registry.activate(subscriber_id, &subscription);

        match activation {
            Activation::Started { generation } => {
                tracing::info!(
                    "Activated funding scan for {} every {}s at threshold {} (generation {})",
                    subscriber_id,
                    subscription.interval.as_secs(),
                    subscription.threshold,
                    generation
                );
                self.start_timer(subscriber_id, subscription.interval);
            }
            Activation::Updated { interval_changed } => {
                tracing::info!(
                    "Updated funding scan for {}: threshold {}, every {}s",
                    subscriber_id,
                    subscription.threshold,
                    subscription.interval.as_secs()
                );
                if interval_changed || !self.inner.timers.contains_key(subscriber_id) {
                    self.start_timer(subscriber_id, subscription.interval);
                }
            }
        }
        Ok(activation)
    }

    /// Stops a subscriber's scans and drops its alert state. A scan already
    /// in flight runs to completion and its result is discarded.
    pub fn deactivate(&self, subscriber_id: &str) -> bool {
        self.stop_timer(subscriber_id);
        let removed = self.inner.registry.deactivate(subscriber_id);
        if removed {
            tracing::info!("Deactivated funding scan for {}", subscriber_id);
        }
        removed
    }

    /// Stops every timer and waits for the timer tasks to exit.
    pub async fn shutdown(&self) {
        let ids: Vec<SubscriberId> = self
            .inner
            .timers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for id in ids {
            if let Some((_, handle)) = self.inner.timers.remove(&id) {
                let _ = handle.stop.send(true);
                if let Err(e) = handle.task.await {
                    tracing::warn!("Timer task for {} ended abnormally: {}", id, e);
                }
            }
            self.inner.registry.deactivate(&id);
        }
        tracing::info!("Scheduler stopped");
    }

    /// Runs one scan cycle for a subscriber: scan the universe under the
    /// subscriber's threshold, update its alert state and dispatch one alert
    /// per newly qualifying instrument.
    ///
    /// Dispatch stops as soon as the subscriber is deactivated, including an
    /// alert the sink is still delivering. An alert the sink refuses is
    /// retracted so the next cycle reports it again.
    pub async fn run_cycle(&self, subscriber_id: &str) -> CycleOutcome {
        let cycle = match self.inner.registry.begin_guarded(subscriber_id) {
            Some(cycle) => cycle,
            None => {
                tracing::debug!("Tick dropped for {}: inactive or scan in flight", subscriber_id);
                return CycleOutcome::Skipped;
            }
        };
        let ticket = cycle.ticket().clone();

        // the semaphore is never closed, so a permit is always granted
        let _permit = self.inner.scan_permits.acquire().await.ok();

        let instruments = self.inner.universe.snapshot().await;
        let outcome = self
            .inner
            .scanner
            .scan(&instruments, ticket.market, ticket.threshold)
            .await;

        let hits = outcome.as_ref().map(|r| r.hits.len()).unwrap_or(0);
        match cycle.complete(&outcome) {
            Completion::Discarded => CycleOutcome::Discarded,
            Completion::Failed => match outcome {
                Err(e) => {
                    tracing::error!("Funding scan for {} failed: {}", subscriber_id, e);
                    CycleOutcome::Failed(e)
                }
                Ok(_) => CycleOutcome::Completed { hits, dispatched: 0 },
            },
            Completion::Alerts(events) => self.dispatch_alerts(&ticket, events, hits).await,
        }
    }

    async fn dispatch_alerts(
        &self,
        ticket: &CycleTicket,
        events: Vec<AlertEvent>,
        hits: usize,
    ) -> CycleOutcome {
        let registry = &self.inner.registry;
        let mut dispatched = 0;

        for event in events {
            let delivery = tokio::select! {
                biased;
                _ = registry.wait_released(ticket) => None,
                result = self.inner.sink.dispatch(event.clone()) => Some(result),
            };

            match delivery {
                None => {
                    tracing::debug!(
                        "Stopped dispatching alerts for {}: subscriber no longer active",
                        ticket.subscriber_id
                    );
                    return CycleOutcome::Discarded;
                }
                Some(Ok(())) => dispatched += 1,
                Some(Err(e)) => {
                    tracing::warn!(
                        "Failed to dispatch alert for {} to {}: {}",
                        event.instrument,
                        ticket.subscriber_id,
                        e
                    );
                    registry.retract_alert(ticket, &event);
                }
            }
        }

        tracing::info!(
            "Funding scan for {}: {} at or below threshold, {} new alerts",
            ticket.subscriber_id,
            hits,
            dispatched
        );
        CycleOutcome::Completed { hits, dispatched }
    }

    fn start_timer(&self, subscriber_id: &str, interval: Duration) {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let scheduler = self.clone();
        let id = subscriber_id.to_string();
        let first_delay = self.inner.config.first_delay;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + first_delay, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Run the cycle on its own task so a stop signal is
                        // observed immediately even while a scan is running
                        let scheduler = scheduler.clone();
                        let id = id.clone();
                        tokio::spawn(async move {
                            scheduler.run_cycle(&id).await;
                        });
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            tracing::debug!("Timer for {} stopped", id);
                            break;
                        }
                    }
                }
            }
        });

        let handle = TimerHandle {
            stop: stop_tx,
            task,
        };
        if let Some(previous) = self.inner.timers.insert(subscriber_id.to_string(), handle) {
            let _ = previous.stop.send(true);
        }
    }

    fn stop_timer(&self, subscriber_id: &str) {
        if let Some((_, handle)) = self.inner.timers.remove(subscriber_id) {
            let _ = handle.stop.send(true);
        }
    }
}
