//! In-process fan-out of [`DomainEvent`]s.
//!
//! Every component that changes state publishes here. Subscribers that fall
//! behind lose the oldest events (`RecvError::Lagged`) instead of blocking
//! the publisher.

use nudge_core::DomainEvent;
use tokio::sync::broadcast;

/// Cloneable handle to the event channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Create a bus that buffers up to `capacity` events per subscriber.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Returns how many subscribers received it; zero when
    /// nobody is listening.
    pub fn publish(&self, event: DomainEvent) -> usize {
        tracing::debug!(event = event.event_name(), "Publishing event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
