use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AuthorizationStatus, ChecklistId, Coordinate, NotificationId, ReminderId};

/// All domain events the scheduling engine emits.
///
/// Events are published after the state change they describe and consumed by:
/// - Foreground UI (open a checklist, refresh a list, update the badge)
/// - Companion-device mirroring
/// - Logging and diagnostics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DomainEvent {
    // =========================================================================
    // Reminder Events
    // =========================================================================
    /// A reminder's escalation ladder was (re)placed with the sink.
    RemindersScheduled {
        reminder_id: ReminderId,
        identifiers: Vec<NotificationId>,
        timestamp: DateTime<Utc>,
    },

    /// Every alert of a reminder was submitted for cancellation.
    RemindersCancelled {
        reminder_id: ReminderId,
        cancelled: usize,
        timestamp: DateTime<Utc>,
    },

    /// A side alert was added for a reminder.
    ReminderSnoozed {
        reminder_id: ReminderId,
        identifier: NotificationId,
        fire_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A reminder was completed outside the foreground UI (alert action or
    /// companion device).
    ReminderCompletedExternally {
        reminder_id: ReminderId,
        timestamp: DateTime<Utc>,
    },

    /// The user opened a reminder alert without acting on it.
    OpenReminder {
        reminder_id: ReminderId,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Checklist Events
    // =========================================================================
    /// A checklist rule's alerts were (re)placed with the sink.
    ChecklistRuleScheduled {
        checklist_id: ChecklistId,
        identifiers: Vec<NotificationId>,
        timestamp: DateTime<Utc>,
    },

    /// The user left a checklist's region.
    ChecklistDue {
        checklist_id: ChecklistId,
        timestamp: DateTime<Utc>,
    },

    /// A checklist alert was tapped; the UI should show the checklist.
    OpenChecklist {
        checklist_id: ChecklistId,
        title: Option<String>,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Location Events
    // =========================================================================
    GeofenceEnabled {
        checklist_id: ChecklistId,
        region_identifier: String,
        radius_meters: f64,
        timestamp: DateTime<Utc>,
    },

    GeofenceDisabled {
        checklist_id: ChecklistId,
        region_identifier: String,
        timestamp: DateTime<Utc>,
    },

    LocationAuthorizationChanged {
        status: AuthorizationStatus,
        timestamp: DateTime<Utc>,
    },

    /// A one-shot location request produced a fix.
    LocationResolved {
        coordinate: Coordinate,
        timestamp: DateTime<Utc>,
    },

    /// A one-shot location request failed.
    LocationFailed {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Misc
    // =========================================================================
    BadgeUpdated {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Reminder templates changed on the companion device.
    TemplatesChanged { timestamp: DateTime<Utc> },
}

impl DomainEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::RemindersScheduled { timestamp, .. }
            | DomainEvent::RemindersCancelled { timestamp, .. }
            | DomainEvent::ReminderSnoozed { timestamp, .. }
            | DomainEvent::ReminderCompletedExternally { timestamp, .. }
            | DomainEvent::OpenReminder { timestamp, .. }
            | DomainEvent::ChecklistRuleScheduled { timestamp, .. }
            | DomainEvent::ChecklistDue { timestamp, .. }
            | DomainEvent::OpenChecklist { timestamp, .. }
            | DomainEvent::GeofenceEnabled { timestamp, .. }
            | DomainEvent::GeofenceDisabled { timestamp, .. }
            | DomainEvent::LocationAuthorizationChanged { timestamp, .. }
            | DomainEvent::LocationResolved { timestamp, .. }
            | DomainEvent::LocationFailed { timestamp, .. }
            | DomainEvent::BadgeUpdated { timestamp, .. }
            | DomainEvent::TemplatesChanged { timestamp } => *timestamp,
        }
    }

    /// Returns a human-readable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            DomainEvent::RemindersScheduled { .. } => "reminders_scheduled",
            DomainEvent::RemindersCancelled { .. } => "reminders_cancelled",
            DomainEvent::ReminderSnoozed { .. } => "reminder_snoozed",
            DomainEvent::ReminderCompletedExternally { .. } => "reminder_completed_externally",
            DomainEvent::OpenReminder { .. } => "open_reminder",
            DomainEvent::ChecklistRuleScheduled { .. } => "checklist_rule_scheduled",
            DomainEvent::ChecklistDue { .. } => "checklist_due",
            DomainEvent::OpenChecklist { .. } => "open_checklist",
            DomainEvent::GeofenceEnabled { .. } => "geofence_enabled",
            DomainEvent::GeofenceDisabled { .. } => "geofence_disabled",
            DomainEvent::LocationAuthorizationChanged { .. } => "location_authorization_changed",
            DomainEvent::LocationResolved { .. } => "location_resolved",
            DomainEvent::LocationFailed { .. } => "location_failed",
            DomainEvent::BadgeUpdated { .. } => "badge_updated",
            DomainEvent::TemplatesChanged { .. } => "templates_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_timestamp() {
        let ts = Utc::now();
        let event = DomainEvent::ChecklistDue {
            checklist_id: ChecklistId::new(),
            timestamp: ts,
        };
        assert_eq!(event.timestamp(), ts);
    }

    #[test]
    fn test_event_names() {
        let ts = Utc::now();
        let cases = vec![
            (
                DomainEvent::ReminderCompletedExternally {
                    reminder_id: ReminderId::new(),
                    timestamp: ts,
                },
                "reminder_completed_externally",
            ),
            (
                DomainEvent::BadgeUpdated {
                    count: 3,
                    timestamp: ts,
                },
                "badge_updated",
            ),
            (
                DomainEvent::LocationAuthorizationChanged {
                    status: AuthorizationStatus::Denied,
                    timestamp: ts,
                },
                "location_authorization_changed",
            ),
            (DomainEvent::TemplatesChanged { timestamp: ts }, "templates_changed"),
        ];
        for (event, name) in cases {
            assert_eq!(event.event_name(), name);
            assert_eq!(event.timestamp(), ts);
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = DomainEvent::ReminderSnoozed {
            reminder_id: ReminderId::new(),
            identifier: NotificationId::new("abc_snooze"),
            fire_at: Utc::now(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("ReminderSnoozed"));
        assert!(json.contains("abc_snooze"));
    }
}
