//! Error types for the scheduling engine.

use nudge_core::error::NudgeError;
use nudge_core::types::{NotificationId, ReminderId};

/// Errors reported by a notification sink.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SinkError {
    #[error("Sink rejected {identifier}: {reason}")]
    Rejected {
        identifier: NotificationId,
        reason: String,
    },
    #[error("Sink timed out")]
    Timeout,
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the scheduling coordinator.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    /// The sink refused one of the alerts. Earlier alerts of the same batch
    /// stay placed; a later reschedule cancels them.
    #[error("Failed to submit {identifier}: {source}")]
    SubmissionFailed {
        identifier: NotificationId,
        #[source]
        source: SinkError,
    },
    /// Alerts were placed but the bookkeeping could not be saved.
    #[error("Submitted {} alert(s) for {subject} but failed to persist: {source}", .submitted.len())]
    PersistenceFailed {
        subject: String,
        submitted: Vec<NotificationId>,
        #[source]
        source: NudgeError,
    },
    #[error("Reminder not found: {0}")]
    ReminderNotFound(ReminderId),
    #[error("Storage error: {0}")]
    Storage(#[from] NudgeError),
}

/// How a caller recovers from a [`SchedulingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Run the operation again. It cancels before it submits.
    Rerun,
    /// The alerts are placed and will fire. Retry only the identifier write
    /// (`persist_reminder_identifiers` or `persist_checklist_identifiers`);
    /// re-running the operation would submit them again.
    RetryPersistence,
    /// Retrying cannot succeed.
    GiveUp,
}

impl SchedulingError {
    pub fn recovery(&self) -> Recovery {
        match self {
            SchedulingError::PersistenceFailed { .. } => Recovery::RetryPersistence,
            SchedulingError::SubmissionFailed { .. } | SchedulingError::Storage(_) => {
                Recovery::Rerun
            }
            SchedulingError::ReminderNotFound(_) => Recovery::GiveUp,
        }
    }
}

/// Errors from location services and the geofence monitor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Location authorization denied")]
    AuthorizationDenied,
    #[error("Current position unavailable: {0}")]
    PositionUnavailable(String),
    #[error("Region monitoring unavailable on this device")]
    MonitoringUnavailable,
    #[error("Region registration failed: {0}")]
    Registration(String),
}

/// Errors from companion-device sync.
#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    #[error("Unknown companion action: {0}")]
    UnknownAction(String),
    #[error("Malformed companion message: {0}")]
    Malformed(String),
    #[error("Companion send failed: {0}")]
    SendFailed(String),
    #[error("Failed to apply companion message: {0}")]
    Apply(#[from] SchedulingError),
}
