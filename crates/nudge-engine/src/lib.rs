//! Escalating notification scheduling engine for Nudge.
//!
//! Turns reminders and checklist rules into time-triggered alerts of rising
//! urgency, keeps rescheduling idempotent with a cancel-first cycle, derives
//! the badge count, watches checklist geofences and routes alert responses.

pub mod badge;
pub mod bus;
pub mod clock;
pub mod companion;
pub mod coordinator;
pub mod error;
pub mod geofence;
pub mod locks;
pub mod memory;
pub mod notification;
pub mod planner;
pub mod ports;
pub mod router;
pub mod sink;

pub use bus::EventBus;
pub use clock::{Clock, ManualClock, SystemClock};
pub use companion::{CompanionLink, CompanionMessage, CompanionSync, SyncOutcome};
pub use coordinator::{Coordinator, EscalationSettings, SnoozeOutcome, SnoozeTarget};
pub use error::{CompanionError, LocationError, Recovery, SchedulingError, SinkError};
pub use geofence::{CircularRegion, GeofenceMonitor, LocationRequest};
pub use memory::{MemoryChecklistStore, MemoryReminderStore};
pub use notification::{AlertContext, Category, NotificationRequest, Trigger};
pub use planner::{
    level_for_ordinal, plan, plan_checklist, EscalationLevel, EscalationPlanEntry, PlanContext,
    QuietHours,
};
pub use ports::{ChecklistStore, LocationService, NotificationSink, ReminderStore};
pub use router::{NotificationResponse, ResponseAction, ResponseRouter, RouteOutcome};
pub use sink::{Delivery, MemorySink, SinkOperation};
