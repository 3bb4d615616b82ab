//! Collaborator seams.
//!
//! The engine owns the scheduling rules; persistence, the platform's alert
//! scheduler and location services live behind these traits. The `memory`
//! and `sink` modules provide in-process implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nudge_core::types::{
    AuthorizationStatus, ChecklistId, ChecklistRule, Coordinate, NotificationId, ReminderEvent,
    ReminderId,
};
use nudge_core::Result;

use crate::error::{LocationError, SinkError};
use crate::geofence::CircularRegion;
use crate::notification::NotificationRequest;

/// Durable storage of reminders.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn load(&self, id: ReminderId) -> Result<Option<ReminderEvent>>;

    /// Insert or replace a reminder.
    async fn save(&self, reminder: &ReminderEvent) -> Result<()>;

    /// Reminders not completed whose due time is at or after `as_of`.
    async fn all_pending(&self, as_of: DateTime<Utc>) -> Result<Vec<ReminderEvent>>;
}

/// Durable storage of checklist rules.
#[async_trait]
pub trait ChecklistStore: Send + Sync {
    async fn load_rule(&self, id: ChecklistId) -> Result<Option<ChecklistRule>>;
    async fn save_rule(&self, rule: &ChecklistRule) -> Result<()>;
}

/// The platform's alert scheduler.
///
/// Submitting an identifier that is already pending replaces it. Cancelling
/// an unknown identifier is a no-op.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn submit(&self, request: NotificationRequest) -> std::result::Result<(), SinkError>;

    /// Remove pending and already delivered alerts with these identifiers.
    async fn cancel(&self, identifiers: &[NotificationId]);

    async fn set_badge_count(&self, count: usize);
}

/// Platform location services.
#[async_trait]
pub trait LocationService: Send + Sync {
    async fn authorization_status(&self) -> AuthorizationStatus;

    /// Prompt for permission. The answer arrives later through
    /// `GeofenceMonitor::handle_authorization_change`.
    async fn request_authorization(&self);

    fn is_monitoring_available(&self) -> bool;

    /// Register a region. Registering an identifier again replaces it.
    async fn start_monitoring(
        &self,
        region: &CircularRegion,
    ) -> std::result::Result<(), LocationError>;

    async fn stop_monitoring(&self, region_identifier: &str);

    async fn request_one_shot_location(&self) -> std::result::Result<Coordinate, LocationError>;
}
