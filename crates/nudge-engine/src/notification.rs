//! Alert requests handed to the notification sink.
//!
//! A [`NotificationRequest`] is the engine's whole vocabulary towards the
//! platform: identifier, trigger, content, level and a typed
//! [`AlertContext`] that comes back verbatim when the user acts on the alert.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Utc};
use nudge_core::types::{
    weekday_number, ChecklistId, ChecklistRule, NotificationId, ReminderEvent, ReminderId,
    TimeOfDay,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::local_to_utc;
use crate::planner::{ChecklistPlanEntry, EscalationLevel, EscalationPlanEntry};

pub const SNOOZE_TITLE: &str = "Snoozed reminder";
pub const CHECKLIST_BODY: &str = "There are unchecked items. Take a look?";
pub const GEOFENCE_EXIT_TITLE: &str = "You left a saved place";
pub const GEOFENCE_EXIT_BODY: &str = "Check your checklist before you go";

/// Action set offered with an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Complete and snooze actions.
    Reminder,
    /// A single "open checklist" action.
    Checklist,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Reminder => "REMINDER_CATEGORY",
            Category::Checklist => "CHECKLIST_REMINDER",
        }
    }
}

/// Data attached to an alert and handed back with the user's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertContext {
    Reminder {
        reminder_id: ReminderId,
        title: String,
        /// `None` for the snooze side alert.
        level: Option<EscalationLevel>,
    },
    Checklist {
        checklist_id: ChecklistId,
        title: Option<String>,
    },
}

/// When an alert fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Once, at an instant.
    At(DateTime<Utc>),
    /// Every day at a local time.
    Daily(TimeOfDay),
    /// Every week on a weekday (1 = Sunday ..= 7 = Saturday) at a local time.
    Weekly { weekday: u8, time: TimeOfDay },
}

impl Trigger {
    pub fn repeats(&self) -> bool {
        !matches!(self, Trigger::At(_))
    }

    /// First firing strictly after `after`. One-shot triggers that already
    /// passed return `None`.
    pub fn next_fire_after(
        &self,
        after: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Option<DateTime<Utc>> {
        match *self {
            Trigger::At(at) => (at > after).then_some(at),
            Trigger::Daily(time) => next_local_occurrence(time, after, offset),
            Trigger::Weekly { weekday, time } => {
                next_weekly_occurrence(weekday, time, after, offset)
            }
        }
    }
}

/// Next local occurrence of `time` strictly after `after`: today if still
/// ahead, otherwise tomorrow.
pub fn next_local_occurrence(
    time: TimeOfDay,
    after: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    let today = after.with_timezone(&offset).date_naive();
    let candidate = local_to_utc(today.and_time(time.to_naive_time()), offset)?;
    if candidate > after {
        Some(candidate)
    } else {
        candidate.checked_add_signed(Duration::days(1))
    }
}

/// Next local occurrence of `weekday` at `time` strictly after `after`.
pub fn next_weekly_occurrence(
    weekday: u8,
    time: TimeOfDay,
    after: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    if !(1..=7).contains(&weekday) {
        return None;
    }
    let today = after.with_timezone(&offset).date_naive();
    let current = weekday_number(today.weekday());
    let days_ahead = (i64::from(weekday) + 7 - i64::from(current)) % 7;
    let date = today.checked_add_signed(Duration::days(days_ahead))?;
    let candidate = local_to_utc(date.and_time(time.to_naive_time()), offset)?;
    if candidate > after {
        Some(candidate)
    } else {
        candidate.checked_add_signed(Duration::days(7))
    }
}

/// One alert to place with the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub identifier: NotificationId,
    pub trigger: Trigger,
    pub title: String,
    pub body: String,
    pub level: EscalationLevel,
    pub sound_suppressed: bool,
    pub category: Category,
    /// Badge value to show with the alert, when known.
    pub badge: Option<usize>,
    pub context: AlertContext,
}

impl NotificationRequest {
    /// One step of a reminder's escalation ladder.
    pub fn escalation(
        entry: &EscalationPlanEntry,
        reminder: &ReminderEvent,
        badge: Option<usize>,
    ) -> Self {
        Self {
            identifier: entry.identifier.clone(),
            trigger: Trigger::At(entry.fire_at),
            title: entry.level.title().to_string(),
            body: reminder.title.clone(),
            level: entry.level,
            sound_suppressed: entry.sound_suppressed,
            category: Category::Reminder,
            badge,
            context: AlertContext::Reminder {
                reminder_id: reminder.id,
                title: reminder.title.clone(),
                level: Some(entry.level),
            },
        }
    }

    /// The side alert added by a snooze.
    pub fn snooze(
        identifier: NotificationId,
        reminder_id: ReminderId,
        title: &str,
        fire_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier,
            trigger: Trigger::At(fire_at),
            title: SNOOZE_TITLE.to_string(),
            body: title.to_string(),
            level: EscalationLevel::Reminder,
            sound_suppressed: false,
            category: Category::Reminder,
            badge: None,
            context: AlertContext::Reminder {
                reminder_id,
                title: title.to_string(),
                level: None,
            },
        }
    }

    /// One alert of a checklist rule.
    pub fn checklist_rule(entry: &ChecklistPlanEntry, rule: &ChecklistRule) -> Self {
        Self {
            identifier: entry.identifier.clone(),
            trigger: entry.trigger,
            title: format!("Don't forget: {}", rule.title),
            body: CHECKLIST_BODY.to_string(),
            level: entry.level,
            sound_suppressed: false,
            category: Category::Checklist,
            badge: None,
            context: AlertContext::Checklist {
                checklist_id: rule.id,
                title: Some(rule.title.clone()),
            },
        }
    }

    /// The single informational alert sent when a checklist's region is left.
    pub fn geofence_exit(checklist_id: ChecklistId, fire_at: DateTime<Utc>) -> Self {
        Self {
            identifier: NotificationId::new(format!(
                "geo_exit_{checklist_id}_{}",
                Uuid::new_v4()
            )),
            trigger: Trigger::At(fire_at),
            title: GEOFENCE_EXIT_TITLE.to_string(),
            body: GEOFENCE_EXIT_BODY.to_string(),
            level: EscalationLevel::Initial,
            sound_suppressed: false,
            category: Category::Checklist,
            badge: None,
            context: AlertContext::Checklist {
                checklist_id,
                title: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_at_trigger_only_fires_in_future() {
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let trigger = Trigger::At(t);
        assert!(!trigger.repeats());
        assert_eq!(trigger.next_fire_after(t - Duration::seconds(1), utc()), Some(t));
        assert_eq!(trigger.next_fire_after(t, utc()), None);
    }

    #[test]
    fn test_daily_trigger_rolls_over() {
        let time = TimeOfDay::new(9, 0).unwrap();
        let trigger = Trigger::Daily(time);
        assert!(trigger.repeats());

        let before = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        assert_eq!(
            trigger.next_fire_after(before, utc()),
            Some(Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap())
        );
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        assert_eq!(
            trigger.next_fire_after(at, utc()),
            Some(Utc.with_ymd_and_hms(2026, 1, 6, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_weekly_trigger_finds_next_weekday() {
        // 2026-01-05 is a Monday (weekday number 2).
        let monday = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        assert_eq!(monday.weekday(), Weekday::Mon);
        let time = TimeOfDay::new(9, 0).unwrap();

        // Wednesday (4) at 09:00 is two days ahead.
        let wed = Trigger::Weekly { weekday: 4, time };
        assert_eq!(
            wed.next_fire_after(monday, utc()),
            Some(Utc.with_ymd_and_hms(2026, 1, 7, 9, 0, 0).unwrap())
        );

        // Monday 09:00 already passed today, so next week.
        let mon = Trigger::Weekly { weekday: 2, time };
        assert_eq!(
            mon.next_fire_after(monday, utc()),
            Some(Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap())
        );

        let bogus = Trigger::Weekly { weekday: 0, time };
        assert_eq!(bogus.next_fire_after(monday, utc()), None);
    }

    #[test]
    fn test_next_local_occurrence_uses_offset() {
        // 23:30 UTC on the 5th is 08:30 on the 6th in UTC+9.
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 5, 23, 30, 0).unwrap();
        let next = next_local_occurrence(TimeOfDay::new(9, 0).unwrap(), after, tokyo).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 6, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_escalation_request_content() {
        let due = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let reminder = ReminderEvent::new("Water the plants", due);
        let entry = EscalationPlanEntry {
            identifier: NotificationId::new("x_2"),
            fire_at: due,
            level: EscalationLevel::Urgent,
            sound_suppressed: true,
        };
        let req = NotificationRequest::escalation(&entry, &reminder, Some(4));
        assert_eq!(req.title, "Important reminder");
        assert_eq!(req.body, "Water the plants");
        assert_eq!(req.category, Category::Reminder);
        assert_eq!(req.badge, Some(4));
        assert!(req.sound_suppressed);
        assert_eq!(
            req.context,
            AlertContext::Reminder {
                reminder_id: reminder.id,
                title: "Water the plants".into(),
                level: Some(EscalationLevel::Urgent),
            }
        );
    }

    #[test]
    fn test_geofence_exit_identifiers_are_unique() {
        let id = ChecklistId::new();
        let now = Utc::now();
        let a = NotificationRequest::geofence_exit(id, now);
        let b = NotificationRequest::geofence_exit(id, now);
        assert_ne!(a.identifier, b.identifier);
        assert!(a
            .identifier
            .as_str()
            .starts_with(&format!("geo_exit_{id}_")));
        assert_eq!(a.category.as_str(), "CHECKLIST_REMINDER");
    }

    #[test]
    fn test_alert_context_serializes_with_type_tag() {
        let ctx = AlertContext::Checklist {
            checklist_id: ChecklistId::new(),
            title: None,
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["type"], "checklist");
    }
}
