//! Per-subscriber scan state and alert deduplication.
//!
//! The registry is the only owner of `last_alerted`. A cycle starts with
//! [`SubscriberRegistry::begin_cycle`], which hands out a ticket bound to the
//! subscriber's current activation, and ends with
//! [`SubscriberRegistry::complete_cycle`], which applies the scan result only
//! if that activation is still the live one. Scheduled cycles go through
//! [`SubscriberRegistry::begin_guarded`] so that a cycle dropped before
//! completion does not keep the subscriber marked in flight.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use volscope_analytics::ScanReport;
use volscope_core::{AnalyticsError, MarketCategory};

use crate::config::Subscription;
use crate::dispatch::AlertEvent;

pub type SubscriberId = String;

/// Background scan state of one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberScanState {
    pub subscriber_id: SubscriberId,
    pub active: bool,
    pub interval: Duration,
    pub threshold: Decimal,
    pub market: MarketCategory,
    /// Instruments already reported, with the rate at their last alert
    pub last_alerted: HashMap<String, Decimal>,
    /// Activation this state belongs to
    pub generation: u64,
    pub in_flight: bool,
}

/// Proof that a scan was started for a specific activation.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleTicket {
    pub subscriber_id: SubscriberId,
    pub generation: u64,
    pub threshold: Decimal,
    pub market: MarketCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// New state created; a timer must be started
    Started { generation: u64 },
    /// Already active; settings updated, alert state kept
    Updated { interval_changed: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Subscriber was deactivated or re-activated while the scan ran
    Discarded,
    /// Scan failed; alert state untouched
    Failed,
    /// Alerts to dispatch, possibly none
    Alerts(Vec<AlertEvent>),
}

pub struct SubscriberRegistry {
    states: DashMap<SubscriberId, SubscriberScanState>,
    generations: AtomicU64,
    realert_step: Option<Decimal>,
    released: Notify,
}

/// A cycle in flight. Dropping it without calling [`CycleGuard::complete`]
/// releases the subscriber's in-flight slot.
pub struct CycleGuard<'a> {
    registry: &'a SubscriberRegistry,
    ticket: CycleTicket,
    completed: bool,
}

impl CycleGuard<'_> {
    pub fn ticket(&self) -> &CycleTicket {
        &self.ticket
    }

    pub fn complete(mut self, outcome: &Result<ScanReport, AnalyticsError>) -> Completion {
        self.completed = true;
        self.registry.complete_cycle(&self.ticket, outcome)
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            tracing::debug!(
                "Cycle for {} ended before completion, releasing it",
                self.ticket.subscriber_id
            );
            self.registry.abandon_cycle(&self.ticket);
        }
    }
}

impl SubscriberRegistry {
    pub fn new(realert_step: Option<Decimal>) -> Self {
        Self {
            states: DashMap::new(),
            generations: AtomicU64::new(0),
            realert_step,
            released: Notify::new(),
        }
    }

    /// Activates a subscriber or updates the settings of an active one.
    pub fn activate(&self, subscriber_id: &str, subscription: &Subscription) -> Activation {
        match self.states.entry(subscriber_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                let interval_changed = state.interval != subscription.interval;
                state.threshold = subscription.threshold;
                state.interval = subscription.interval;
                state.market = subscription.market;
                Activation::Updated { interval_changed }
            }
            Entry::Vacant(entry) => {
                let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
                entry.insert(SubscriberScanState {
                    subscriber_id: subscriber_id.to_string(),
                    active: true,
                    interval: subscription.interval,
                    threshold: subscription.threshold,
                    market: subscription.market,
                    last_alerted: HashMap::new(),
                    generation,
                    in_flight: false,
                });
                Activation::Started { generation }
            }
        }
    }

    /// Removes a subscriber's state. Returns false when it was not active.
    pub fn deactivate(&self, subscriber_id: &str) -> bool {
        match self.states.remove(subscriber_id) {
            Some((_, mut state)) => {
                state.active = false;
                if state.in_flight {
                    tracing::debug!(
                        "Deactivated {} with a scan in flight; its result will be discarded",
                        subscriber_id
                    );
                }
                self.released.notify_waiters();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, subscriber_id: &str) -> bool {
        self.states
            .get(subscriber_id)
            .map(|s| s.active)
            .unwrap_or(false)
    }

    pub fn get(&self, subscriber_id: &str) -> Option<SubscriberScanState> {
        self.states.get(subscriber_id).map(|s| s.clone())
    }

    pub fn subscribers(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<SubscriberId> = self.states.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Marks a scan as in flight. `None` when the subscriber is not active
    /// or its previous scan has not finished, in which case the tick is dropped.
    pub fn begin_cycle(&self, subscriber_id: &str) -> Option<CycleTicket> {
        let mut state = self.states.get_mut(subscriber_id)?;
        if !state.active || state.in_flight {
            return None;
        }
        state.in_flight = true;
        Some(CycleTicket {
            subscriber_id: state.subscriber_id.clone(),
            generation: state.generation,
            threshold: state.threshold,
            market: state.market,
        })
    }

    /// Like [`Self::begin_cycle`], with the in-flight slot released when the
    /// returned guard is dropped before completion.
    pub fn begin_guarded(&self, subscriber_id: &str) -> Option<CycleGuard<'_>> {
        self.begin_cycle(subscriber_id).map(|ticket| CycleGuard {
            registry: self,
            ticket,
            completed: false,
        })
    }

    /// Whether the activation the ticket belongs to is still live.
    pub fn is_current(&self, ticket: &CycleTicket) -> bool {
        self.states
            .get(&ticket.subscriber_id)
            .map(|s| s.active && s.generation == ticket.generation)
            .unwrap_or(false)
    }

    /// Resolves once the ticket's activation is no longer live.
    pub async fn wait_released(&self, ticket: &CycleTicket) {
        loop {
            let released = self.released.notified();
            if !self.is_current(ticket) {
                return;
            }
            released.await;
        }
    }

    /// Clears `in_flight` for a cycle that will never complete.
    pub fn abandon_cycle(&self, ticket: &CycleTicket) {
        if let Some(mut state) = self.states.get_mut(&ticket.subscriber_id) {
            if state.generation == ticket.generation {
                state.in_flight = false;
            }
        }
    }

    /// Forgets an alert the sink did not accept, so the instrument is alerted
    /// again on the next cycle. Returns false for a stale ticket or when a
    /// later alert already replaced the entry.
    pub fn retract_alert(&self, ticket: &CycleTicket, event: &AlertEvent) -> bool {
        let mut state = match self.states.get_mut(&ticket.subscriber_id) {
            Some(state) if state.generation == ticket.generation => state,
            _ => return false,
        };
        if state.last_alerted.get(&event.instrument) == Some(&event.rate) {
            state.last_alerted.remove(&event.instrument);
            true
        } else {
            false
        }
    }

    /// Applies a scan result to the activation the ticket belongs to and
    /// returns the alerts to dispatch.
    pub fn complete_cycle(
        &self,
        ticket: &CycleTicket,
        outcome: &Result<ScanReport, AnalyticsError>,
    ) -> Completion {
        let mut state = match self.states.get_mut(&ticket.subscriber_id) {
            Some(state) if state.generation == ticket.generation => state,
            _ => {
                tracing::debug!(
                    "Discarding scan result for {}: subscriber no longer active",
                    ticket.subscriber_id
                );
                return Completion::Discarded;
            }
        };
        state.in_flight = false;

        if !state.active {
            return Completion::Discarded;
        }

        let report = match outcome {
            Ok(report) => report,
            Err(e) => {
                tracing::debug!("Scan for {} failed, alert state kept: {}", ticket.subscriber_id, e);
                return Completion::Failed;
            }
        };

        let mut next_alerted = HashMap::with_capacity(report.hits.len());
        let mut events = Vec::new();
        for hit in &report.hits {
            let previous = state.last_alerted.get(&hit.instrument).copied();
            let alert = match (previous, self.realert_step) {
                (None, _) => true,
                (Some(prev), Some(step)) => prev - hit.rate >= step,
                (Some(_), None) => false,
            };

            if alert {
                next_alerted.insert(hit.instrument.clone(), hit.rate);
                events.push(AlertEvent {
                    subscriber_id: state.subscriber_id.clone(),
                    instrument: hit.instrument.clone(),
                    rate: hit.rate,
                    observed_at: hit.observed_at,
                });
            } else if let Some(prev) = previous {
                next_alerted.insert(hit.instrument.clone(), prev);
            }
        }
        state.last_alerted = next_alerted;

        Completion::Alerts(events)
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}
