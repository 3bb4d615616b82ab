//! Badge count derivation.

use chrono::{DateTime, FixedOffset, Utc};
use nudge_core::types::ReminderEvent;

use crate::clock::start_of_local_day;

/// Number of reminders that are not completed and are due at or after the
/// start of the local day containing `as_of`.
///
/// Anything due before today's local midnight is not counted, completed or
/// not.
pub fn count(events: &[ReminderEvent], as_of: DateTime<Utc>, offset: FixedOffset) -> usize {
    let Some(day_start) = start_of_local_day(as_of, offset) else {
        return 0;
    };
    events
        .iter()
        .filter(|e| !e.completed && e.due_at >= day_start)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_counts_incomplete_from_start_of_today() {
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 15, 0, 0).unwrap();
        let mut done = ReminderEvent::new("done", now + Duration::hours(1));
        done.mark_completed(now);

        let events = vec![
            ReminderEvent::new("this morning", Utc.with_ymd_and_hms(2026, 6, 10, 8, 0, 0).unwrap()),
            ReminderEvent::new("tonight", now + Duration::hours(5)),
            ReminderEvent::new("yesterday", now - Duration::days(1)),
            done,
        ];
        assert_eq!(count(&events, now, utc()), 2);
    }

    #[test]
    fn test_midnight_boundary_is_included() {
        let midnight = Utc.with_ymd_and_hms(2026, 6, 10, 0, 0, 0).unwrap();
        let events = vec![
            ReminderEvent::new("at midnight", midnight),
            ReminderEvent::new("just before", midnight - Duration::seconds(1)),
        ];
        assert_eq!(count(&events, midnight + Duration::hours(9), utc()), 1);
    }

    #[test]
    fn test_day_boundary_follows_local_offset() {
        // 16:00 UTC on the 10th is 01:00 on the 11th in UTC+9, so the local
        // day starts at 15:00 UTC on the 10th.
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 16, 0, 0).unwrap();
        let events = vec![
            ReminderEvent::new("before local midnight", Utc.with_ymd_and_hms(2026, 6, 10, 14, 0, 0).unwrap()),
            ReminderEvent::new("after local midnight", Utc.with_ymd_and_hms(2026, 6, 10, 15, 30, 0).unwrap()),
        ];
        assert_eq!(count(&events, now, tokyo), 1);
        assert_eq!(count(&events, now, utc()), 2);
    }

    #[test]
    fn test_empty_list_counts_zero() {
        assert_eq!(count(&[], Utc::now(), utc()), 0);
    }
}
