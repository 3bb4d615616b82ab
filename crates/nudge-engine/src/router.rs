//! Response router.
//!
//! Translates what the user did with a delivered alert into a coordinator
//! call or a UI signal on the event bus.

use std::sync::Arc;

use chrono::Duration;
use nudge_core::types::{ChecklistId, NotificationId, ReminderId};
use nudge_core::DomainEvent;
use serde::{Deserialize, Serialize};

use crate::coordinator::{Coordinator, SnoozeOutcome, SnoozeTarget};
use crate::error::SchedulingError;
use crate::notification::AlertContext;

/// Action the user took on an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    Complete,
    Snooze,
    /// Default tap on the alert body.
    Open,
    Dismiss,
    ViewChecklist,
}

/// A user response as delivered by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub identifier: NotificationId,
    pub action: ResponseAction,
    pub context: AlertContext,
}

/// What routing a response did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Completed(ReminderId),
    Snoozed {
        reminder_id: ReminderId,
        identifier: NotificationId,
    },
    /// Snooze on an alert whose reminder was completed meanwhile.
    AlreadyCompleted(ReminderId),
    OpenReminder(ReminderId),
    ShowChecklist(ChecklistId),
    Ignored,
}

pub struct ResponseRouter {
    coordinator: Arc<Coordinator>,
    snooze: Duration,
}

impl ResponseRouter {
    pub fn new(coordinator: Arc<Coordinator>, snooze: Duration) -> Self {
        Self { coordinator, snooze }
    }

    pub async fn route(
        &self,
        response: &NotificationResponse,
    ) -> Result<RouteOutcome, SchedulingError> {
        let now = self.coordinator.clock().now();
        tracing::debug!(
            identifier = %response.identifier,
            action = ?response.action,
            "Routing alert response"
        );

        match (&response.context, response.action) {
            (AlertContext::Reminder { reminder_id, .. }, ResponseAction::Complete) => {
                self.coordinator.complete(*reminder_id).await?;
                self.coordinator
                    .events()
                    .publish(DomainEvent::ReminderCompletedExternally {
                        reminder_id: *reminder_id,
                        timestamp: now,
                    });
                Ok(RouteOutcome::Completed(*reminder_id))
            }
            (AlertContext::Reminder { reminder_id, title, .. }, ResponseAction::Snooze) => {
                let target = SnoozeTarget {
                    reminder_id: *reminder_id,
                    title: title.clone(),
                };
                match self.coordinator.schedule_snooze(&target, self.snooze).await? {
                    SnoozeOutcome::Scheduled { identifier, .. } => Ok(RouteOutcome::Snoozed {
                        reminder_id: *reminder_id,
                        identifier,
                    }),
                    SnoozeOutcome::ReminderCompleted => {
                        Ok(RouteOutcome::AlreadyCompleted(*reminder_id))
                    }
                }
            }
            (AlertContext::Reminder { reminder_id, .. }, ResponseAction::Open) => {
                self.coordinator.events().publish(DomainEvent::OpenReminder {
                    reminder_id: *reminder_id,
                    timestamp: now,
                });
                Ok(RouteOutcome::OpenReminder(*reminder_id))
            }
            // Checklist alerts are informational. Any action except a
            // dismissal shows the checklist.
            (AlertContext::Checklist { checklist_id, title }, action)
                if action != ResponseAction::Dismiss =>
            {
                self.coordinator.events().publish(DomainEvent::OpenChecklist {
                    checklist_id: *checklist_id,
                    title: title.clone(),
                    timestamp: now,
                });
                Ok(RouteOutcome::ShowChecklist(*checklist_id))
            }
            (_, action) => {
                tracing::debug!(identifier = %response.identifier, ?action, "Response ignored");
                Ok(RouteOutcome::Ignored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::clock::ManualClock;
    use crate::coordinator::EscalationSettings;
    use crate::memory::{MemoryChecklistStore, MemoryReminderStore};
    use crate::planner::EscalationLevel;
    use crate::ports::ReminderStore;
    use crate::sink::MemorySink;
    use chrono::{TimeZone, Utc};
    use nudge_core::types::ReminderEvent;

    struct Harness {
        router: ResponseRouter,
        coordinator: Arc<Coordinator>,
        reminders: Arc<MemoryReminderStore>,
        sink: Arc<MemorySink>,
        events: EventBus,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::utc(
            Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap(),
        ));
        let sink = Arc::new(MemorySink::new(clock.clone()));
        let reminders = Arc::new(MemoryReminderStore::new());
        let events = EventBus::new(64);
        let coordinator = Arc::new(Coordinator::new(
            reminders.clone(),
            Arc::new(MemoryChecklistStore::new()),
            sink.clone(),
            clock,
            events.clone(),
            EscalationSettings::default(),
        ));
        Harness {
            router: ResponseRouter::new(coordinator.clone(), Duration::minutes(5)),
            coordinator,
            reminders,
            sink,
            events,
        }
    }

    fn reminder_response(event: &ReminderEvent, action: ResponseAction) -> NotificationResponse {
        NotificationResponse {
            identifier: NotificationId::new(format!("{}_0", event.id)),
            action,
            context: AlertContext::Reminder {
                reminder_id: event.id,
                title: event.title.clone(),
                level: Some(EscalationLevel::Initial),
            },
        }
    }

    async fn scheduled(h: &Harness) -> ReminderEvent {
        let now = h.coordinator.clock().now();
        let event = ReminderEvent::new("Call the dentist", now + Duration::minutes(5));
        h.reminders.save(&event).await.unwrap();
        h.coordinator.reschedule(&event).await.unwrap();
        event
    }

    #[tokio::test]
    async fn test_complete_marks_and_sweeps() {
        let h = harness();
        let event = scheduled(&h).await;
        let mut rx = h.events.subscribe();

        let outcome = h
            .router
            .route(&reminder_response(&event, ResponseAction::Complete))
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::Completed(event.id));
        assert!(h.sink.pending_identifiers().is_empty());

        let stored = h.reminders.load(event.id).await.unwrap().unwrap();
        assert!(stored.completed);
        assert!(stored.completed_at.is_some());

        let mut saw_external = false;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev, DomainEvent::ReminderCompletedExternally { reminder_id, .. } if reminder_id == event.id) {
                saw_external = true;
            }
        }
        assert!(saw_external);
    }

    #[tokio::test]
    async fn test_snooze_uses_alert_context_without_store() {
        let h = harness();
        // Never saved: the snooze must still go through.
        let event = ReminderEvent::new("Unsaved", h.coordinator.clock().now());

        let outcome = h
            .router
            .route(&reminder_response(&event, ResponseAction::Snooze))
            .await
            .unwrap();
        let RouteOutcome::Snoozed { identifier, .. } = outcome else {
            panic!("expected snooze outcome");
        };
        let pending = h.sink.pending(&identifier).unwrap();
        assert_eq!(pending.request.body, "Unsaved");
        assert_eq!(
            pending.next_fire,
            h.coordinator.clock().now() + Duration::minutes(5)
        );
    }

    #[tokio::test]
    async fn test_snooze_on_stale_alert_after_complete() {
        let h = harness();
        let event = scheduled(&h).await;
        h.router
            .route(&reminder_response(&event, ResponseAction::Complete))
            .await
            .unwrap();

        let outcome = h
            .router
            .route(&reminder_response(&event, ResponseAction::Snooze))
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::AlreadyCompleted(event.id));
        assert!(h.sink.pending_identifiers().is_empty());
        let stored = h.reminders.load(event.id).await.unwrap().unwrap();
        assert!(stored.scheduled_identifiers.is_empty());
    }

    #[tokio::test]
    async fn test_open_has_no_scheduling_side_effect() {
        let h = harness();
        let event = scheduled(&h).await;
        let before = h.sink.pending_identifiers();

        let outcome = h
            .router
            .route(&reminder_response(&event, ResponseAction::Open))
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::OpenReminder(event.id));
        assert_eq!(h.sink.pending_identifiers(), before);
    }

    #[tokio::test]
    async fn test_checklist_alert_only_shows_checklist() {
        let h = harness();
        let checklist_id = ChecklistId::new();
        let mut rx = h.events.subscribe();
        let response = NotificationResponse {
            identifier: NotificationId::new("geo_exit_x"),
            action: ResponseAction::Complete,
            context: AlertContext::Checklist {
                checklist_id,
                title: Some("Leaving home".into()),
            },
        };

        let outcome = h.router.route(&response).await.unwrap();
        assert_eq!(outcome, RouteOutcome::ShowChecklist(checklist_id));
        assert!(matches!(
            rx.recv().await.unwrap(),
            DomainEvent::OpenChecklist { checklist_id: got, .. } if got == checklist_id
        ));
    }

    #[tokio::test]
    async fn test_dismiss_is_ignored() {
        let h = harness();
        let event = scheduled(&h).await;
        let outcome = h
            .router
            .route(&reminder_response(&event, ResponseAction::Dismiss))
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_complete_unknown_reminder_fails() {
        let h = harness();
        let event = ReminderEvent::new("ghost", h.coordinator.clock().now());
        let err = h
            .router
            .route(&reminder_response(&event, ResponseAction::Complete))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulingError::ReminderNotFound(_)));
    }
}
