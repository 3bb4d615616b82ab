//! Companion-device sync.
//!
//! Messages between the phone and a paired companion device are a closed
//! tagged enum, encoded as JSON with an `action` field. Unknown actions are
//! rejected at the boundary. Sending is best effort: reachability is
//! checked up front and the caller gets a typed outcome to decide whether to
//! queue or drop.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nudge_core::config::CompanionConfig;
use nudge_core::types::{ReminderEvent, ReminderId};
use nudge_core::DomainEvent;
use serde::{Deserialize, Serialize};

use crate::coordinator::Coordinator;
use crate::error::{CompanionError, SchedulingError};
use crate::ports::ReminderStore;

const KNOWN_ACTIONS: [&str; 3] = ["createReminder", "completeReminder", "templatesUpdated"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum CompanionMessage {
    #[serde(rename = "createReminder", rename_all = "camelCase")]
    Create {
        title: String,
        due_at: DateTime<Utc>,
        id: ReminderId,
    },
    #[serde(rename = "completeReminder")]
    Complete { id: ReminderId },
    #[serde(rename = "templatesUpdated")]
    TemplatesChanged,
}

impl CompanionMessage {
    pub fn decode(payload: &[u8]) -> Result<Self, CompanionError> {
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| CompanionError::Malformed(e.to_string()))?;
        let action = value
            .get("action")
            .and_then(|a| a.as_str())
            .ok_or_else(|| CompanionError::Malformed("missing action".to_string()))?;
        if !KNOWN_ACTIONS.contains(&action) {
            return Err(CompanionError::UnknownAction(action.to_string()));
        }
        serde_json::from_value(value).map_err(|e| CompanionError::Malformed(e.to_string()))
    }

    pub fn encode(&self) -> Result<Vec<u8>, CompanionError> {
        serde_json::to_vec(self).map_err(|e| CompanionError::Malformed(e.to_string()))
    }

    pub fn action(&self) -> &'static str {
        match self {
            CompanionMessage::Create { .. } => "createReminder",
            CompanionMessage::Complete { .. } => "completeReminder",
            CompanionMessage::TemplatesChanged => "templatesUpdated",
        }
    }
}

/// Transport to the companion device.
#[async_trait]
pub trait CompanionLink: Send + Sync {
    fn is_reachable(&self) -> bool;
    async fn send(&self, payload: Vec<u8>) -> Result<(), CompanionError>;
}

/// Outcome of a best-effort push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Delivered,
    Unreachable,
    Disabled,
    Failed(String),
}

pub struct CompanionSync {
    link: Arc<dyn CompanionLink>,
    coordinator: Arc<Coordinator>,
    reminders: Arc<dyn ReminderStore>,
    enabled: bool,
}

impl CompanionSync {
    pub fn new(
        link: Arc<dyn CompanionLink>,
        coordinator: Arc<Coordinator>,
        reminders: Arc<dyn ReminderStore>,
        config: &CompanionConfig,
    ) -> Self {
        Self {
            link,
            coordinator,
            reminders,
            enabled: config.enabled,
        }
    }

    /// Send one message if the companion is reachable. Never retries.
    pub async fn push(&self, message: &CompanionMessage) -> SyncOutcome {
        if !self.enabled {
            return SyncOutcome::Disabled;
        }
        if !self.link.is_reachable() {
            tracing::debug!(action = message.action(), "Companion unreachable");
            return SyncOutcome::Unreachable;
        }
        let result = match message.encode() {
            Ok(payload) => self.link.send(payload).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => SyncOutcome::Delivered,
            Err(e) => {
                tracing::warn!(action = message.action(), error = %e, "Companion send failed");
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    pub async fn reminder_created(&self, event: &ReminderEvent) -> SyncOutcome {
        self.push(&CompanionMessage::Create {
            title: event.title.clone(),
            due_at: event.due_at,
            id: event.id,
        })
        .await
    }

    pub async fn reminder_completed(&self, id: ReminderId) -> SyncOutcome {
        self.push(&CompanionMessage::Complete { id }).await
    }

    /// Decode and apply an inbound payload. Ignored while sync is disabled.
    pub async fn receive(&self, payload: &[u8]) -> Result<(), CompanionError> {
        if !self.enabled {
            tracing::debug!("Companion sync disabled, dropping inbound message");
            return Ok(());
        }
        let message = CompanionMessage::decode(payload)?;
        self.apply(message).await
    }

    pub async fn apply(&self, message: CompanionMessage) -> Result<(), CompanionError> {
        let now = self.coordinator.clock().now();
        match message {
            CompanionMessage::Create { title, due_at, id } => {
                let mut event = self
                    .reminders
                    .load(id)
                    .await
                    .map_err(SchedulingError::from)?
                    .unwrap_or_else(|| ReminderEvent::with_id(id, title.clone(), due_at));
                event.title = title;
                event.due_at = due_at;
                self.reminders
                    .save(&event)
                    .await
                    .map_err(SchedulingError::from)?;
                self.coordinator.reschedule(&event).await?;
                tracing::info!(reminder_id = %id, "Reminder created from companion");
            }
            CompanionMessage::Complete { id } => {
                self.coordinator.complete(id).await?;
                self.coordinator
                    .events()
                    .publish(DomainEvent::ReminderCompletedExternally {
                        reminder_id: id,
                        timestamp: now,
                    });
            }
            CompanionMessage::TemplatesChanged => {
                self.coordinator
                    .events()
                    .publish(DomainEvent::TemplatesChanged { timestamp: now });
            }
        }
        Ok(())
    }
}
