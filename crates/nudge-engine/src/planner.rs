//! Escalation planner.
//!
//! Pure functions that turn a reminder due time, or a checklist rule, into the
//! list of alerts to hand to the notification sink. Nothing here touches a
//! clock, a store or a sink; "now" and the local offset come in through
//! [`PlanContext`].

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use nudge_core::types::{ChecklistId, ChecklistRule, NotificationId, RepeatMode, SATURDAY, SUNDAY};
use serde::{Deserialize, Serialize};

use crate::notification::{next_local_occurrence, Trigger};

/// Shortest allowed gap between two escalation steps, in seconds.
pub const MIN_INTERVAL_SECS: i64 = 60;

/// Suffix of the single side alert a snooze adds.
pub const SNOOZE_SUFFIX: &str = "snooze";

/// Urgency of one alert. Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    Initial,
    Reminder,
    Urgent,
    Critical,
}

impl EscalationLevel {
    /// Every level, in ladder order.
    pub const ALL: [EscalationLevel; 4] = [
        EscalationLevel::Initial,
        EscalationLevel::Reminder,
        EscalationLevel::Urgent,
        EscalationLevel::Critical,
    ];

    pub fn ordinal(self) -> usize {
        match self {
            EscalationLevel::Initial => 0,
            EscalationLevel::Reminder => 1,
            EscalationLevel::Urgent => 2,
            EscalationLevel::Critical => 3,
        }
    }

    /// Alert title shown for this step of the ladder.
    pub fn title(self) -> &'static str {
        match self {
            EscalationLevel::Initial => "Reminder",
            EscalationLevel::Reminder => "Reminder (again)",
            EscalationLevel::Urgent => "Important reminder",
            EscalationLevel::Critical => "Urgent reminder",
        }
    }
}

impl fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            EscalationLevel::Initial => "initial",
            EscalationLevel::Reminder => "reminder",
            EscalationLevel::Urgent => "urgent",
            EscalationLevel::Critical => "critical",
        })
    }
}

/// Level for a ladder position. Positions past the last level return `None`
/// rather than clamping.
pub fn level_for_ordinal(ordinal: usize) -> Option<EscalationLevel> {
    EscalationLevel::ALL.get(ordinal).copied()
}

/// Local-hour window in which non-critical alerts are delivered silently.
///
/// `start_hour` is inclusive, `end_hour` exclusive. A window may wrap past
/// midnight (22 to 7). Equal bounds mean there is no quiet window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl QuietHours {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour == self.end_hour {
            false
        } else if self.start_hour < self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

impl Default for QuietHours {
    fn default() -> Self {
        Self::new(22, 7)
    }
}

/// Inputs the planner needs besides the event itself.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
    pub quiet_hours: QuietHours,
}

/// One alert of a reminder's escalation ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationPlanEntry {
    pub identifier: NotificationId,
    pub fire_at: DateTime<Utc>,
    pub level: EscalationLevel,
    pub sound_suppressed: bool,
}

/// One alert of a checklist rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistPlanEntry {
    pub identifier: NotificationId,
    pub trigger: Trigger,
    pub level: EscalationLevel,
}

/// Level every checklist rule alert carries. Rules do not escalate.
pub const CHECKLIST_LEVEL: EscalationLevel = EscalationLevel::Initial;

// =============================================================================
// Identifier scheme
// =============================================================================

/// `{base_id}_{ordinal}`
pub fn ladder_identifier(base_id: &str, ordinal: usize) -> NotificationId {
    NotificationId::new(format!("{base_id}_{ordinal}"))
}

/// `{base_id}_snooze`
pub fn snooze_identifier(base_id: &str) -> NotificationId {
    NotificationId::new(format!("{base_id}_{SNOOZE_SUFFIX}"))
}

/// Every identifier a reminder could own: the full ladder plus the snooze.
pub fn derived_reminder_identifiers(base_id: &str) -> Vec<NotificationId> {
    EscalationLevel::ALL
        .iter()
        .map(|level| ladder_identifier(base_id, level.ordinal()))
        .chain(std::iter::once(snooze_identifier(base_id)))
        .collect()
}

pub fn checklist_once_identifier(id: ChecklistId) -> NotificationId {
    NotificationId::new(format!("checklist_once_{id}"))
}

pub fn checklist_daily_identifier(id: ChecklistId) -> NotificationId {
    NotificationId::new(format!("checklist_daily_{id}"))
}

pub fn checklist_weekly_identifier(id: ChecklistId, weekday: u8) -> NotificationId {
    NotificationId::new(format!("checklist_weekly_{id}_day{weekday}"))
}

/// Every identifier a checklist rule could own, across all repeat modes.
pub fn derived_checklist_identifiers(id: ChecklistId) -> Vec<NotificationId> {
    let mut ids = vec![checklist_once_identifier(id), checklist_daily_identifier(id)];
    ids.extend((SUNDAY..=SATURDAY).map(|day| checklist_weekly_identifier(id, day)));
    ids
}

// =============================================================================
// Planning
// =============================================================================

/// Plan the escalation ladder for a reminder.
///
/// Candidates fire at `due_at + k * I` for `k` in `0..4`, where
/// `I = max(60, escalation_interval_secs)`. Candidates not strictly after
/// `ctx.now` are dropped. Entries whose local hour falls in the quiet window
/// are silent unless they are the critical step.
pub fn plan(
    due_at: DateTime<Utc>,
    base_id: &str,
    escalation_interval_secs: i64,
    ctx: &PlanContext,
) -> Vec<EscalationPlanEntry> {
    let interval = escalation_interval_secs.max(MIN_INTERVAL_SECS);

    EscalationLevel::ALL
        .iter()
        .filter_map(|&level| {
            let offset_secs = interval.checked_mul(level.ordinal() as i64)?;
            let fire_at = due_at.checked_add_signed(Duration::try_seconds(offset_secs)?)?;
            if fire_at <= ctx.now {
                return None;
            }
            let local_hour = fire_at.with_timezone(&ctx.offset).hour();
            let sound_suppressed =
                level != EscalationLevel::Critical && ctx.quiet_hours.contains(local_hour);
            Some(EscalationPlanEntry {
                identifier: ladder_identifier(base_id, level.ordinal()),
                fire_at,
                level,
                sound_suppressed,
            })
        })
        .collect()
}

/// Plan the alerts of a checklist rule.
///
/// Inactive rules (disabled, or weekly without a weekday) plan nothing.
pub fn plan_checklist(rule: &ChecklistRule, ctx: &PlanContext) -> Vec<ChecklistPlanEntry> {
    if !rule.is_active() {
        return Vec::new();
    }

    match rule.repeat_mode {
        RepeatMode::Once => next_local_occurrence(rule.time_of_day, ctx.now, ctx.offset)
            .map(|fire_at| ChecklistPlanEntry {
                identifier: checklist_once_identifier(rule.id),
                trigger: Trigger::At(fire_at),
                level: CHECKLIST_LEVEL,
            })
            .into_iter()
            .collect(),
        RepeatMode::Daily => vec![ChecklistPlanEntry {
            identifier: checklist_daily_identifier(rule.id),
            trigger: Trigger::Daily(rule.time_of_day),
            level: CHECKLIST_LEVEL,
        }],
        RepeatMode::Weekly => rule
            .valid_weekdays()
            .map(|weekday| ChecklistPlanEntry {
                identifier: checklist_weekly_identifier(rule.id, weekday),
                trigger: Trigger::Weekly {
                    weekday,
                    time: rule.time_of_day,
                },
                level: CHECKLIST_LEVEL,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nudge_core::types::TimeOfDay;

    fn ctx_at(now: DateTime<Utc>) -> PlanContext {
        PlanContext {
            now,
            offset: FixedOffset::east_opt(0).unwrap(),
            quiet_hours: QuietHours::default(),
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap()
    }

    // ---- level mapping ----

    #[test]
    fn test_level_for_ordinal() {
        assert_eq!(level_for_ordinal(0), Some(EscalationLevel::Initial));
        assert_eq!(level_for_ordinal(1), Some(EscalationLevel::Reminder));
        assert_eq!(level_for_ordinal(2), Some(EscalationLevel::Urgent));
        assert_eq!(level_for_ordinal(3), Some(EscalationLevel::Critical));
        assert_eq!(level_for_ordinal(4), None);
        assert_eq!(level_for_ordinal(usize::MAX), None);
    }

    #[test]
    fn test_level_ordering_matches_ordinal() {
        for pair in EscalationLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].ordinal() + 1, pair[1].ordinal());
        }
    }

    // ---- quiet hours ----

    #[test]
    fn test_quiet_hours_wrapping_window() {
        let q = QuietHours::default();
        for hour in [22, 23, 0, 3, 6] {
            assert!(q.contains(hour), "hour {hour} should be quiet");
        }
        for hour in [7, 8, 12, 21] {
            assert!(!q.contains(hour), "hour {hour} should not be quiet");
        }
    }

    #[test]
    fn test_quiet_hours_non_wrapping_and_empty() {
        let q = QuietHours::new(1, 5);
        assert!(q.contains(1));
        assert!(q.contains(4));
        assert!(!q.contains(5));
        assert!(!q.contains(0));

        let none = QuietHours::new(8, 8);
        assert!((0..24).all(|h| !none.contains(h)));
    }

    // ---- reminder ladder ----

    #[test]
    fn test_due_in_five_minutes_with_ten_minute_interval_yields_full_ladder() {
        let now = noon();
        let due = now + Duration::seconds(300);
        let entries = plan(due, "r1", 600, &ctx_at(now));

        assert_eq!(entries.len(), 4);
        let fire_offsets: Vec<i64> = entries
            .iter()
            .map(|e| (e.fire_at - now).num_seconds())
            .collect();
        assert_eq!(fire_offsets, vec![300, 900, 1500, 2100]);
        let levels: Vec<EscalationLevel> = entries.iter().map(|e| e.level).collect();
        assert_eq!(levels, EscalationLevel::ALL.to_vec());
        assert_eq!(entries[0].identifier.as_str(), "r1_0");
        assert_eq!(entries[3].identifier.as_str(), "r1_3");
    }

    #[test]
    fn test_due_two_minutes_ago_drops_initial_step() {
        let now = noon();
        let due = now - Duration::seconds(120);
        let entries = plan(due, "r2", 300, &ctx_at(now));

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].level, EscalationLevel::Reminder);
        assert_eq!(entries[0].identifier.as_str(), "r2_1");
        let fire_offsets: Vec<i64> = entries
            .iter()
            .map(|e| (e.fire_at - now).num_seconds())
            .collect();
        assert_eq!(fire_offsets, vec![180, 480, 780]);
    }

    #[test]
    fn test_fire_time_equal_to_now_is_dropped() {
        let now = noon();
        let entries = plan(now, "r3", 60, &ctx_at(now));
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.fire_at > now));
    }

    #[test]
    fn test_interval_is_floored_to_one_minute() {
        let now = noon();
        let due = now + Duration::seconds(10);
        for interval in [i64::MIN, -5, 0, 1, 59] {
            let entries = plan(due, "r4", interval, &ctx_at(now));
            assert_eq!(entries.len(), 4);
            assert_eq!((entries[1].fire_at - entries[0].fire_at).num_seconds(), 60);
        }
    }

    #[test]
    fn test_huge_interval_drops_unrepresentable_steps() {
        let now = noon();
        let entries = plan(now + Duration::seconds(1), "r5", i64::MAX, &ctx_at(now));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, EscalationLevel::Initial);
    }

    #[test]
    fn test_long_past_due_plans_nothing() {
        let now = noon();
        let entries = plan(now - Duration::days(2), "r6", 300, &ctx_at(now));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_fire_times_strictly_increase_and_levels_never_decrease() {
        let now = noon();
        for due_offset in [-3000_i64, -301, -1, 0, 1, 59, 3600] {
            for interval in [0_i64, 60, 61, 300, 7200] {
                let entries = plan(
                    now + Duration::seconds(due_offset),
                    "p",
                    interval,
                    &ctx_at(now),
                );
                for pair in entries.windows(2) {
                    assert!(pair[0].fire_at < pair[1].fire_at);
                    assert!(pair[0].level <= pair[1].level);
                }
                assert!(entries.iter().all(|e| e.fire_at > now));
            }
        }
    }

    // ---- night suppression ----

    #[test]
    fn test_night_entries_are_silent_except_critical() {
        // Ladder at 21:50, 22:00, 22:10, 22:20 UTC.
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 21, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2026, 6, 10, 21, 50, 0).unwrap();
        let entries = plan(due, "n", 600, &ctx_at(now));

        assert_eq!(entries.len(), 4);
        assert!(!entries[0].sound_suppressed, "21:50 is outside quiet hours");
        assert!(entries[1].sound_suppressed);
        assert!(entries[2].sound_suppressed);
        assert_eq!(entries[3].level, EscalationLevel::Critical);
        assert!(!entries[3].sound_suppressed, "critical always sounds");
    }

    #[test]
    fn test_night_suppression_uses_local_offset() {
        // 13:30 UTC is 22:30 in UTC+9.
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 13, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2026, 6, 10, 13, 30, 0).unwrap();
        let ctx = PlanContext {
            offset: FixedOffset::east_opt(9 * 3600).unwrap(),
            ..ctx_at(now)
        };
        let entries = plan(due, "tz", 300, &ctx);
        assert!(entries[0].sound_suppressed);

        let utc_entries = plan(due, "tz", 300, &ctx_at(now));
        assert!(!utc_entries[0].sound_suppressed);
    }

    #[test]
    fn test_morning_boundary_is_not_quiet() {
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 6, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2026, 6, 10, 6, 59, 0).unwrap();
        let entries = plan(due, "m", 60, &ctx_at(now));
        assert!(entries[0].sound_suppressed, "06:59 is quiet");
        assert!(!entries[1].sound_suppressed, "07:00 is not quiet");
    }

    // ---- identifiers ----

    #[test]
    fn test_derived_reminder_identifiers() {
        let ids: Vec<String> = derived_reminder_identifiers("abc")
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["abc_0", "abc_1", "abc_2", "abc_3", "abc_snooze"]);
    }

    #[test]
    fn test_derived_checklist_identifiers_cover_every_mode() {
        let id = ChecklistId::new();
        let ids = derived_checklist_identifiers(id);
        assert_eq!(ids.len(), 9);
        assert!(ids.contains(&checklist_once_identifier(id)));
        assert!(ids.contains(&checklist_daily_identifier(id)));
        assert!(ids.contains(&checklist_weekly_identifier(id, 1)));
        assert!(ids.contains(&checklist_weekly_identifier(id, 7)));
    }

    // ---- checklist rules ----

    fn rule(mode: RepeatMode, days: &[u8]) -> ChecklistRule {
        let mut rule = ChecklistRule::new(
            ChecklistId::new(),
            "Leaving home",
            TimeOfDay::new(8, 30).unwrap(),
        );
        rule.repeat_mode = mode;
        rule.weekdays = days.iter().copied().collect();
        rule
    }

    #[test]
    fn test_checklist_once_fires_today_when_time_is_ahead() {
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 7, 0, 0).unwrap();
        let r = rule(RepeatMode::Once, &[]);
        let entries = plan_checklist(&r, &ctx_at(now));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identifier, checklist_once_identifier(r.id));
        assert_eq!(
            entries[0].trigger,
            Trigger::At(Utc.with_ymd_and_hms(2026, 6, 10, 8, 30, 0).unwrap())
        );
        assert_eq!(entries[0].level, CHECKLIST_LEVEL);
    }

    #[test]
    fn test_checklist_once_rolls_to_tomorrow_when_time_passed() {
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 8, 30, 0).unwrap();
        let entries = plan_checklist(&rule(RepeatMode::Once, &[]), &ctx_at(now));
        assert_eq!(
            entries[0].trigger,
            Trigger::At(Utc.with_ymd_and_hms(2026, 6, 11, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_checklist_daily_is_one_repeating_entry() {
        let r = rule(RepeatMode::Daily, &[2, 3]);
        let entries = plan_checklist(&r, &ctx_at(noon()));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identifier, checklist_daily_identifier(r.id));
        assert_eq!(entries[0].trigger, Trigger::Daily(r.time_of_day));
    }

    #[test]
    fn test_checklist_weekly_is_one_entry_per_day() {
        let r = rule(RepeatMode::Weekly, &[2, 4, 6]);
        let entries = plan_checklist(&r, &ctx_at(noon()));
        assert_eq!(entries.len(), 3);
        let days: Vec<u8> = entries
            .iter()
            .map(|e| match e.trigger {
                Trigger::Weekly { weekday, .. } => weekday,
                _ => panic!("expected weekly trigger"),
            })
            .collect();
        assert_eq!(days, vec![2, 4, 6]);
        assert_eq!(entries[1].identifier, checklist_weekly_identifier(r.id, 4));
    }

    #[test]
    fn test_checklist_inactive_rules_plan_nothing() {
        assert!(plan_checklist(&rule(RepeatMode::Weekly, &[]), &ctx_at(noon())).is_empty());

        let mut disabled = rule(RepeatMode::Daily, &[]);
        disabled.enabled = false;
        assert!(plan_checklist(&disabled, &ctx_at(noon())).is_empty());
    }
}
