//! Scheduling coordinator.
//!
//! Owns the cancel-first cycle for reminders and checklist rules:
//! cancel everything the subject could own, plan, submit each alert,
//! persist the identifiers that were placed. Operations on one reminder (or
//! one checklist) are serialized; different subjects run concurrently.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use nudge_core::config::EscalationConfig;
use nudge_core::types::{ChecklistId, ChecklistRule, NotificationId, ReminderEvent, ReminderId};
use nudge_core::{DomainEvent, NudgeError};

use crate::badge;
use crate::bus::EventBus;
use crate::clock::{start_of_local_day, Clock};
use crate::error::SchedulingError;
use crate::locks::KeyedLocks;
use crate::notification::NotificationRequest;
use crate::planner::{
    derived_checklist_identifiers, derived_reminder_identifiers, plan, plan_checklist,
    snooze_identifier, PlanContext, QuietHours,
};
use crate::ports::{ChecklistStore, NotificationSink, ReminderStore};

/// Delay between a geofence exit and its alert.
const IMMEDIATE_DELAY_SECS: i64 = 1;

/// Escalation parameters the coordinator plans with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationSettings {
    pub interval_secs: i64,
    pub quiet_hours: QuietHours,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self::from(&EscalationConfig::default())
    }
}

impl From<&EscalationConfig> for EscalationSettings {
    fn from(config: &EscalationConfig) -> Self {
        Self {
            interval_secs: config.interval_secs,
            quiet_hours: QuietHours::new(config.quiet_start_hour, config.quiet_end_hour),
        }
    }
}

/// What a snooze needs to know about its reminder. Taken from the alert's
/// context so snoozing works without a store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnoozeTarget {
    pub reminder_id: ReminderId,
    pub title: String,
}

impl From<&ReminderEvent> for SnoozeTarget {
    fn from(event: &ReminderEvent) -> Self {
        Self {
            reminder_id: event.id,
            title: event.title.clone(),
        }
    }
}

/// Result of [`Coordinator::schedule_snooze`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnoozeOutcome {
    Scheduled {
        identifier: NotificationId,
        fire_at: DateTime<Utc>,
    },
    /// The stored reminder was already completed. The side alert was
    /// withdrawn again.
    ReminderCompleted,
}

impl SnoozeOutcome {
    pub fn identifier(&self) -> Option<&NotificationId> {
        match self {
            SnoozeOutcome::Scheduled { identifier, .. } => Some(identifier),
            SnoozeOutcome::ReminderCompleted => None,
        }
    }
}

/// What bookkeeping made of a placed snooze.
enum SnoozeRecord {
    Recorded,
    /// No stored record, or storage could not be reached.
    Untracked,
    ReminderCompleted,
}

/// Explicitly constructed scheduling service. Collaborators are injected.
pub struct Coordinator {
    reminders: Arc<dyn ReminderStore>,
    checklists: Arc<dyn ChecklistStore>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    settings: EscalationSettings,
    reminder_locks: KeyedLocks<ReminderId>,
    checklist_locks: KeyedLocks<ChecklistId>,
}

impl Coordinator {
    pub fn new(
        reminders: Arc<dyn ReminderStore>,
        checklists: Arc<dyn ChecklistStore>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        settings: EscalationSettings,
    ) -> Self {
        Self {
            reminders,
            checklists,
            sink,
            clock,
            events,
            settings,
            reminder_locks: KeyedLocks::new(),
            checklist_locks: KeyedLocks::new(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> EscalationSettings {
        self.settings
    }

    fn plan_context(&self) -> PlanContext {
        PlanContext {
            now: self.clock.now(),
            offset: self.clock.local_offset(),
            quiet_hours: self.settings.quiet_hours,
        }
    }

    // =========================================================================
    // Reminders
    // =========================================================================

    /// Replace every alert of `event` with a freshly planned ladder.
    ///
    /// Returns the identifiers that were placed. A reminder that is completed,
    /// either in `event` or in its stored record, is only swept. Individual
    /// submission failures are logged and skipped.
    pub async fn reschedule(
        &self,
        event: &ReminderEvent,
    ) -> Result<BTreeSet<NotificationId>, SchedulingError> {
        let _guard = self.reminder_locks.lock(&event.id).await;

        let (_, stored) = self.sweep_reminder(event).await;
        let completed = event.completed || stored.as_ref().is_some_and(|s| s.completed);

        let mut placed = BTreeSet::new();
        if !completed {
            let ctx = self.plan_context();
            let entries = plan(
                event.due_at,
                &event.id.to_string(),
                self.settings.interval_secs,
                &ctx,
            );
            let badge = self.current_badge().await;

            for entry in &entries {
                let request = NotificationRequest::escalation(entry, event, badge);
                match self.sink.submit(request).await {
                    Ok(()) => {
                        placed.insert(entry.identifier.clone());
                    }
                    Err(e) => {
                        tracing::warn!(
                            reminder_id = %event.id,
                            identifier = %entry.identifier,
                            error = %e,
                            "Skipping alert the sink refused"
                        );
                    }
                }
            }
        }

        self.persist_reminder_identifiers(event, &placed).await?;

        tracing::info!(
            reminder_id = %event.id,
            placed = placed.len(),
            "Reminder rescheduled"
        );
        self.events.publish(DomainEvent::RemindersScheduled {
            reminder_id: event.id,
            identifiers: placed.iter().cloned().collect(),
            timestamp: self.clock.now(),
        });
        self.refresh_badge().await;

        Ok(placed)
    }

    /// Cancel every alert `event` could own and clear the stored identifier
    /// set. Returns the number of identifiers submitted for cancellation.
    pub async fn cancel(&self, event: &ReminderEvent) -> Result<usize, SchedulingError> {
        let _guard = self.reminder_locks.lock(&event.id).await;

        let (cancelled, stored) = self.sweep_reminder(event).await;
        if let Some(mut stored) = stored {
            if !stored.scheduled_identifiers.is_empty() {
                stored.scheduled_identifiers.clear();
                self.reminders.save(&stored).await?;
            }
        }

        self.events.publish(DomainEvent::RemindersCancelled {
            reminder_id: event.id,
            cancelled,
            timestamp: self.clock.now(),
        });
        self.refresh_badge().await;
        Ok(cancelled)
    }

    /// Mark a stored reminder completed and sweep its alerts.
    ///
    /// Completing twice keeps the first completion time.
    pub async fn complete(&self, reminder_id: ReminderId) -> Result<ReminderEvent, SchedulingError> {
        let _guard = self.reminder_locks.lock(&reminder_id).await;

        let mut event = self
            .reminders
            .load(reminder_id)
            .await?
            .ok_or(SchedulingError::ReminderNotFound(reminder_id))?;
        event.mark_completed(self.clock.now());

        let (cancelled, _) = self.sweep_reminder(&event).await;
        event.scheduled_identifiers.clear();
        self.reminders.save(&event).await?;

        tracing::info!(%reminder_id, cancelled, "Reminder completed");
        self.events.publish(DomainEvent::RemindersCancelled {
            reminder_id,
            cancelled,
            timestamp: self.clock.now(),
        });
        self.refresh_badge().await;
        Ok(event)
    }

    /// Add one side alert `from_now` in the future without touching the
    /// ladder. A second snooze replaces the first.
    ///
    /// The alert is placed from `target` alone. If the stored reminder turns
    /// out to be completed the alert is cancelled again and
    /// [`SnoozeOutcome::ReminderCompleted`] is returned.
    pub async fn schedule_snooze(
        &self,
        target: &SnoozeTarget,
        from_now: Duration,
    ) -> Result<SnoozeOutcome, SchedulingError> {
        let _guard = self.reminder_locks.lock(&target.reminder_id).await;

        let now = self.clock.now();
        let from_now = from_now.max(Duration::seconds(1));
        let fire_at = now
            .checked_add_signed(from_now)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let identifier = snooze_identifier(&target.reminder_id.to_string());

        let request = NotificationRequest::snooze(
            identifier.clone(),
            target.reminder_id,
            &target.title,
            fire_at,
        );
        self.sink
            .submit(request)
            .await
            .map_err(|source| SchedulingError::SubmissionFailed {
                identifier: identifier.clone(),
                source,
            })?;

        if let SnoozeRecord::ReminderCompleted =
            self.record_snooze(target.reminder_id, &identifier).await
        {
            self.sink.cancel(std::slice::from_ref(&identifier)).await;
            tracing::info!(
                reminder_id = %target.reminder_id,
                %identifier,
                "Snooze withdrawn, reminder already completed"
            );
            return Ok(SnoozeOutcome::ReminderCompleted);
        }

        tracing::info!(
            reminder_id = %target.reminder_id,
            %fire_at,
            "Reminder snoozed"
        );
        self.events.publish(DomainEvent::ReminderSnoozed {
            reminder_id: target.reminder_id,
            identifier: identifier.clone(),
            fire_at,
            timestamp: now,
        });
        Ok(SnoozeOutcome::Scheduled {
            identifier,
            fire_at,
        })
    }

    /// Save `identifiers` onto the stored record of `event`.
    ///
    /// Only the identifier set is written. The rest of the stored record is
    /// kept; `event` is saved as a whole only when nothing is stored yet.
    /// Callers retry this after a [`SchedulingError::PersistenceFailed`]
    /// instead of rescheduling, so placed alerts are not submitted twice.
    pub async fn persist_reminder_identifiers(
        &self,
        event: &ReminderEvent,
        identifiers: &BTreeSet<NotificationId>,
    ) -> Result<(), SchedulingError> {
        let failed = |source: NudgeError| SchedulingError::PersistenceFailed {
            subject: format!("reminder {}", event.id),
            submitted: identifiers.iter().cloned().collect(),
            source,
        };
        let mut record = self
            .reminders
            .load(event.id)
            .await
            .map_err(failed)?
            .unwrap_or_else(|| event.clone());
        record.scheduled_identifiers = identifiers.clone();
        self.reminders.save(&record).await.map_err(failed)
    }

    /// Cancel the union of recorded, stored and derivable identifiers.
    async fn sweep_reminder(&self, event: &ReminderEvent) -> (usize, Option<ReminderEvent>) {
        let stored = match self.reminders.load(event.id).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(
                    reminder_id = %event.id,
                    error = %e,
                    "Could not read stored identifiers, cancelling derived set only"
                );
                None
            }
        };

        let mut identifiers = event.scheduled_identifiers.clone();
        if let Some(stored) = &stored {
            identifiers.extend(stored.scheduled_identifiers.iter().cloned());
        }
        identifiers.extend(derived_reminder_identifiers(&event.id.to_string()));

        let identifiers: Vec<NotificationId> = identifiers.into_iter().collect();
        self.sink.cancel(&identifiers).await;
        tracing::debug!(reminder_id = %event.id, count = identifiers.len(), "Swept reminder alerts");
        (identifiers.len(), stored)
    }

    async fn record_snooze(
        &self,
        reminder_id: ReminderId,
        identifier: &NotificationId,
    ) -> SnoozeRecord {
        let result = match self.reminders.load(reminder_id).await {
            Ok(Some(stored)) if stored.completed => return SnoozeRecord::ReminderCompleted,
            Ok(Some(mut stored)) => {
                if stored.scheduled_identifiers.insert(identifier.clone()) {
                    self.reminders.save(&stored).await
                } else {
                    Ok(())
                }
            }
            Ok(None) => return SnoozeRecord::Untracked,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => SnoozeRecord::Recorded,
            Err(e) => {
                tracing::warn!(%reminder_id, error = %e, "Could not record snooze identifier");
                SnoozeRecord::Untracked
            }
        }
    }

    // =========================================================================
    // Checklist rules
    // =========================================================================

    /// Replace every alert of a checklist rule. Inactive rules are only swept.
    pub async fn schedule_checklist_rule(
        &self,
        rule: &ChecklistRule,
    ) -> Result<BTreeSet<NotificationId>, SchedulingError> {
        let _guard = self.checklist_locks.lock(&rule.id).await;

        self.sweep_checklist(rule).await;

        let ctx = self.plan_context();
        let mut placed = BTreeSet::new();
        for entry in plan_checklist(rule, &ctx) {
            let request = NotificationRequest::checklist_rule(&entry, rule);
            match self.sink.submit(request).await {
                Ok(()) => {
                    placed.insert(entry.identifier);
                }
                Err(e) => {
                    tracing::warn!(
                        checklist_id = %rule.id,
                        identifier = %entry.identifier,
                        error = %e,
                        "Skipping checklist alert the sink refused"
                    );
                }
            }
        }

        self.persist_checklist_identifiers(rule, &placed).await?;

        tracing::info!(
            checklist_id = %rule.id,
            mode = %rule.repeat_mode,
            placed = placed.len(),
            "Checklist rule scheduled"
        );
        self.events.publish(DomainEvent::ChecklistRuleScheduled {
            checklist_id: rule.id,
            identifiers: placed.iter().cloned().collect(),
            timestamp: self.clock.now(),
        });
        Ok(placed)
    }

    /// Save `rule` with `identifiers` as its scheduled set.
    ///
    /// The rule carries no state owned elsewhere, so the caller's copy is
    /// written as is. Retry this after a
    /// [`SchedulingError::PersistenceFailed`] for a checklist.
    pub async fn persist_checklist_identifiers(
        &self,
        rule: &ChecklistRule,
        identifiers: &BTreeSet<NotificationId>,
    ) -> Result<(), SchedulingError> {
        let mut record = rule.clone();
        record.scheduled_identifiers = identifiers.clone();
        self.checklists
            .save_rule(&record)
            .await
            .map_err(|source| SchedulingError::PersistenceFailed {
                subject: format!("checklist {}", rule.id),
                submitted: identifiers.iter().cloned().collect(),
                source,
            })
    }

    /// Cancel every alert a checklist rule could own.
    pub async fn cancel_checklist_rule(
        &self,
        rule: &ChecklistRule,
    ) -> Result<usize, SchedulingError> {
        let _guard = self.checklist_locks.lock(&rule.id).await;

        let (cancelled, stored) = self.sweep_checklist(rule).await;
        if let Some(mut stored) = stored {
            if !stored.scheduled_identifiers.is_empty() {
                stored.scheduled_identifiers.clear();
                self.checklists.save_rule(&stored).await?;
            }
        }
        Ok(cancelled)
    }

    /// Place the single alert for a left region, firing a second from now.
    pub async fn schedule_immediate(
        &self,
        checklist_id: ChecklistId,
    ) -> Result<NotificationId, SchedulingError> {
        let _guard = self.checklist_locks.lock(&checklist_id).await;

        let fire_at = self.clock.now() + Duration::seconds(IMMEDIATE_DELAY_SECS);
        let request = NotificationRequest::geofence_exit(checklist_id, fire_at);
        let identifier = request.identifier.clone();
        self.sink
            .submit(request)
            .await
            .map_err(|source| SchedulingError::SubmissionFailed {
                identifier: identifier.clone(),
                source,
            })?;

        tracing::info!(%checklist_id, %identifier, "Immediate checklist alert placed");
        Ok(identifier)
    }

    async fn sweep_checklist(&self, rule: &ChecklistRule) -> (usize, Option<ChecklistRule>) {
        let stored = match self.checklists.load_rule(rule.id).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(
                    checklist_id = %rule.id,
                    error = %e,
                    "Could not read stored rule, cancelling derived set only"
                );
                None
            }
        };

        let mut identifiers = rule.scheduled_identifiers.clone();
        if let Some(stored) = &stored {
            identifiers.extend(stored.scheduled_identifiers.iter().cloned());
        }
        identifiers.extend(derived_checklist_identifiers(rule.id));

        let identifiers: Vec<NotificationId> = identifiers.into_iter().collect();
        self.sink.cancel(&identifiers).await;
        (identifiers.len(), stored)
    }

    // =========================================================================
    // Badge
    // =========================================================================

    async fn current_badge(&self) -> Option<usize> {
        let now = self.clock.now();
        let offset = self.clock.local_offset();
        let as_of = start_of_local_day(now, offset)?;
        match self.reminders.all_pending(as_of).await {
            Ok(pending) => Some(badge::count(&pending, now, offset)),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read pending reminders for badge");
                None
            }
        }
    }

    /// Recompute the badge and push it to the sink. A read failure leaves the
    /// previous badge in place and returns `None`.
    pub async fn refresh_badge(&self) -> Option<usize> {
        let count = self.current_badge().await?;
        self.sink.set_badge_count(count).await;
        self.events.publish(DomainEvent::BadgeUpdated {
            count,
            timestamp: self.clock.now(),
        });
        Some(count)
    }
}
