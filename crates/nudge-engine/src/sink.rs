//! In-process notification sink with a timer-driven delivery loop.
//!
//! Stands in for the platform alert scheduler: keeps pending alerts by
//! identifier, fires them when due and keeps a journal of every call so
//! tests can assert on ordering.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nudge_core::types::NotificationId;
use tokio::sync::{broadcast, Notify};

use crate::clock::Clock;
use crate::error::SinkError;
use crate::notification::{NotificationRequest, Trigger};
use crate::ports::NotificationSink;

/// How long the delivery loop idles when nothing is pending.
const IDLE_POLL: std::time::Duration = std::time::Duration::from_secs(60);

/// One call made on the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOperation {
    Submit(NotificationId),
    Cancel(Vec<NotificationId>),
    Badge(usize),
}

/// An alert waiting to fire.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAlert {
    pub request: NotificationRequest,
    pub next_fire: DateTime<Utc>,
}

/// An alert that fired.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub request: NotificationRequest,
    pub fired_at: DateTime<Utc>,
}

#[derive(Default)]
struct SinkState {
    pending: HashMap<NotificationId, PendingAlert>,
    delivered: HashMap<NotificationId, Delivery>,
    badge: usize,
    journal: Vec<SinkOperation>,
    rejected: HashSet<NotificationId>,
}

pub struct MemorySink {
    state: Mutex<SinkState>,
    clock: Arc<dyn Clock>,
    delivered_tx: broadcast::Sender<Delivery>,
    changed: Notify,
    shutdown: Notify,
}

impl MemorySink {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (delivered_tx, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(SinkState::default()),
            clock,
            delivered_tx,
            changed: Notify::new(),
            shutdown: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every later submission of `identifier` fail.
    pub fn reject(&self, identifier: NotificationId) {
        self.state().rejected.insert(identifier);
    }

    pub fn pending_identifiers(&self) -> BTreeSet<NotificationId> {
        self.state().pending.keys().cloned().collect()
    }

    pub fn pending(&self, identifier: &NotificationId) -> Option<PendingAlert> {
        self.state().pending.get(identifier).cloned()
    }

    /// Delivered alerts that have not been cancelled since.
    pub fn delivered_identifiers(&self) -> BTreeSet<NotificationId> {
        self.state().delivered.keys().cloned().collect()
    }

    pub fn badge_count(&self) -> usize {
        self.state().badge
    }

    pub fn journal(&self) -> Vec<SinkOperation> {
        self.state().journal.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.delivered_tx.subscribe()
    }

    /// Earliest pending fire time.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.state().pending.values().map(|p| p.next_fire).min()
    }

    /// Fire everything due at the clock's current time. Repeating alerts are
    /// moved to their next occurrence, one-shot alerts are removed.
    pub fn deliver_due(&self) -> Vec<Delivery> {
        let now = self.clock.now();
        let offset = self.clock.local_offset();
        let mut fired = Vec::new();
        {
            let mut state = self.state();
            let due: Vec<NotificationId> = state
                .pending
                .iter()
                .filter(|(_, p)| p.next_fire <= now)
                .map(|(id, _)| id.clone())
                .collect();

            for id in due {
                let Some(mut alert) = state.pending.remove(&id) else {
                    continue;
                };
                let delivery = Delivery {
                    request: alert.request.clone(),
                    fired_at: now,
                };
                if alert.request.trigger.repeats() {
                    if let Some(next) = alert.request.trigger.next_fire_after(now, offset) {
                        alert.next_fire = next;
                        state.pending.insert(id.clone(), alert);
                    }
                }
                state.delivered.insert(id, delivery.clone());
                fired.push(delivery);
            }
        }

        fired.sort_by(|a, b| a.request.identifier.cmp(&b.request.identifier));
        for delivery in &fired {
            tracing::info!(
                identifier = %delivery.request.identifier,
                title = %delivery.request.title,
                level = %delivery.request.level,
                silent = delivery.request.sound_suppressed,
                "Alert delivered"
            );
            let _ = self.delivered_tx.send(delivery.clone());
        }
        fired
    }

    /// Deliver alerts as they come due until [`MemorySink::shutdown`].
    ///
    /// Sleeps until the next fire time, or for a minute when nothing is
    /// pending, and wakes early whenever the pending set changes.
    pub async fn run(&self) {
        loop {
            self.deliver_due();

            let wait = match self.next_due() {
                Some(at) => (at - self.clock.now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO),
                None => IDLE_POLL,
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.changed.notified() => {}
                _ = self.shutdown.notified() => return,
            }
        }
    }

    /// Signal the delivery loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn submit(&self, request: NotificationRequest) -> Result<(), SinkError> {
        let now = self.clock.now();
        let next_fire = match request.trigger {
            Trigger::At(at) => Some(at),
            repeating => repeating.next_fire_after(now, self.clock.local_offset()),
        };

        {
            let mut state = self.state();
            if state.rejected.contains(&request.identifier) {
                return Err(SinkError::Rejected {
                    identifier: request.identifier,
                    reason: "identifier is blocked".to_string(),
                });
            }
            let Some(next_fire) = next_fire else {
                return Err(SinkError::Rejected {
                    identifier: request.identifier,
                    reason: "trigger never fires".to_string(),
                });
            };
            let identifier = request.identifier.clone();
            state
                .journal
                .push(SinkOperation::Submit(identifier.clone()));
            state.pending.insert(identifier, PendingAlert { request, next_fire });
        }

        self.changed.notify_one();
        Ok(())
    }

    async fn cancel(&self, identifiers: &[NotificationId]) {
        {
            let mut state = self.state();
            for id in identifiers {
                state.pending.remove(id);
                state.delivered.remove(id);
            }
            state
                .journal
                .push(SinkOperation::Cancel(identifiers.to_vec()));
        }
        self.changed.notify_one();
    }

    async fn set_badge_count(&self, count: usize) {
        let mut state = self.state();
        state.badge = count;
        state.journal.push(SinkOperation::Badge(count));
    }
}
