//! In-memory reminder and checklist stores.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nudge_core::types::{ChecklistId, ChecklistRule, ReminderEvent, ReminderId};
use nudge_core::{NudgeError, Result};

use crate::ports::{ChecklistStore, ReminderStore};

fn poisoned<E: std::fmt::Display>(e: E) -> NudgeError {
    NudgeError::Storage(format!("Lock poisoned: {}", e))
}

/// Reminder store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryReminderStore {
    reminders: RwLock<HashMap<ReminderId, ReminderEvent>>,
}

impl MemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a reminder. Callers cancel its alerts first.
    pub fn remove(&self, id: ReminderId) -> Result<Option<ReminderEvent>> {
        Ok(self.reminders.write().map_err(poisoned)?.remove(&id))
    }

    pub fn len(&self) -> usize {
        self.reminders.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReminderStore for MemoryReminderStore {
    async fn load(&self, id: ReminderId) -> Result<Option<ReminderEvent>> {
        Ok(self.reminders.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn save(&self, reminder: &ReminderEvent) -> Result<()> {
        self.reminders
            .write()
            .map_err(poisoned)?
            .insert(reminder.id, reminder.clone());
        Ok(())
    }

    async fn all_pending(&self, as_of: DateTime<Utc>) -> Result<Vec<ReminderEvent>> {
        let reminders = self.reminders.read().map_err(poisoned)?;
        let mut pending: Vec<ReminderEvent> = reminders
            .values()
            .filter(|r| !r.completed && r.due_at >= as_of)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.due_at);
        Ok(pending)
    }
}

/// Checklist rule store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryChecklistStore {
    rules: RwLock<HashMap<ChecklistId, ChecklistRule>>,
}

impl MemoryChecklistStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChecklistStore for MemoryChecklistStore {
    async fn load_rule(&self, id: ChecklistId) -> Result<Option<ChecklistRule>> {
        Ok(self.rules.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn save_rule(&self, rule: &ChecklistRule) -> Result<()> {
        self.rules
            .write()
            .map_err(poisoned)?
            .insert(rule.id, rule.clone());
        Ok(())
    }
}
