use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{NudgeError, Result};

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier of a reminder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReminderId(pub Uuid);

impl ReminderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReminderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReminderId {
    type Err = NudgeError;
    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| NudgeError::InvalidInput(format!("bad reminder id {s:?}: {e}")))
    }
}

/// Unique identifier of a checklist. Rules and geofences hang off it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChecklistId(pub Uuid);

impl ChecklistId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChecklistId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChecklistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChecklistId {
    type Err = NudgeError;
    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| NudgeError::InvalidInput(format!("bad checklist id {s:?}: {e}")))
    }
}

/// Opaque identifier of one alert handed to the notification sink.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NotificationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// Time Values
// =============================================================================

/// Wall-clock hour and minute, interpreted in the user's local offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Create a time of day. Rejects hours above 23 and minutes above 59.
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(NudgeError::InvalidInput(format!(
                "time of day out of range: {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self { hour: 9, minute: 0 }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Weekday numbers run 1 (Sunday) through 7 (Saturday).
pub const SUNDAY: u8 = 1;
pub const SATURDAY: u8 = 7;

/// Map a chrono weekday onto the 1 (Sunday) ..= 7 (Saturday) numbering.
pub fn weekday_number(day: chrono::Weekday) -> u8 {
    day.number_from_sunday() as u8
}

// =============================================================================
// Reminders
// =============================================================================

/// A single user-created due item.
///
/// `scheduled_identifiers` lists every alert currently placed with the sink
/// for this reminder. It is emptied on completion or deletion, after each of
/// its identifiers has been submitted for cancellation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReminderEvent {
    pub id: ReminderId,
    pub title: String,
    pub due_at: DateTime<Utc>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_identifiers: BTreeSet<NotificationId>,
}

impl ReminderEvent {
    pub fn new(title: impl Into<String>, due_at: DateTime<Utc>) -> Self {
        Self::with_id(ReminderId::new(), title, due_at)
    }

    pub fn with_id(id: ReminderId, title: impl Into<String>, due_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            due_at,
            completed: false,
            completed_at: None,
            scheduled_identifiers: BTreeSet::new(),
        }
    }

    /// Mark the reminder done. Calling it again keeps the first completion time.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        if !self.completed {
            self.completed = true;
            self.completed_at = Some(at);
        }
    }
}

// =============================================================================
// Checklist Rules
// =============================================================================

/// How a checklist rule repeats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Once,
    Daily,
    Weekly,
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeatMode::Once => write!(f, "once"),
            RepeatMode::Daily => write!(f, "daily"),
            RepeatMode::Weekly => write!(f, "weekly"),
        }
    }
}

/// A recurring or one-shot reminder attached to a checklist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChecklistRule {
    pub id: ChecklistId,
    /// Title of the owning checklist, shown in the alert.
    pub title: String,
    pub enabled: bool,
    pub time_of_day: TimeOfDay,
    pub repeat_mode: RepeatMode,
    /// Selected weekdays (1 = Sunday ..= 7 = Saturday). Only read in weekly mode.
    #[serde(default)]
    pub weekdays: BTreeSet<u8>,
    #[serde(default)]
    pub scheduled_identifiers: BTreeSet<NotificationId>,
}

impl ChecklistRule {
    pub fn new(id: ChecklistId, title: impl Into<String>, time_of_day: TimeOfDay) -> Self {
        Self {
            id,
            title: title.into(),
            enabled: true,
            time_of_day,
            repeat_mode: RepeatMode::Once,
            weekdays: BTreeSet::new(),
            scheduled_identifiers: BTreeSet::new(),
        }
    }

    /// Selected weekdays, with out-of-range numbers dropped.
    pub fn valid_weekdays(&self) -> impl Iterator<Item = u8> + '_ {
        self.weekdays
            .iter()
            .copied()
            .filter(|d| (SUNDAY..=SATURDAY).contains(d))
    }

    /// Whether the rule has a notification path at all.
    ///
    /// Weekly mode with no selected weekday is inactive, not "every day".
    pub fn is_active(&self) -> bool {
        if !self.enabled {
            return false;
        }
        match self.repeat_mode {
            RepeatMode::Weekly => self.valid_weekdays().next().is_some(),
            RepeatMode::Once | RepeatMode::Daily => true,
        }
    }
}

// =============================================================================
// Geofences
// =============================================================================

/// Smallest and largest radius a geofence may use, in meters.
pub const MIN_RADIUS_METERS: f64 = 50.0;
pub const MAX_RADIUS_METERS: f64 = 500.0;

/// Prefix of every region identifier derived from a checklist id.
pub const REGION_PREFIX: &str = "checklist_region_";

/// A WGS84 coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(NudgeError::InvalidInput(format!(
                "coordinate out of range: ({latitude}, {longitude})"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

/// The single exit-monitored region of a checklist.
///
/// Deserializing goes through [`GeofenceBinding::new`], so stored radii are
/// clamped too.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredBinding")]
pub struct GeofenceBinding {
    pub checklist_id: ChecklistId,
    pub center: Coordinate,
    radius_meters: f64,
}

#[derive(Deserialize)]
struct StoredBinding {
    checklist_id: ChecklistId,
    center: Coordinate,
    radius_meters: f64,
}

impl From<StoredBinding> for GeofenceBinding {
    fn from(stored: StoredBinding) -> Self {
        Self::new(stored.checklist_id, stored.center, stored.radius_meters)
    }
}

impl GeofenceBinding {
    /// Create a binding, clamping the radius into
    /// [`MIN_RADIUS_METERS`, `MAX_RADIUS_METERS`]. A NaN radius becomes the minimum.
    pub fn new(checklist_id: ChecklistId, center: Coordinate, radius_meters: f64) -> Self {
        let radius_meters = if radius_meters.is_nan() {
            MIN_RADIUS_METERS
        } else {
            radius_meters.clamp(MIN_RADIUS_METERS, MAX_RADIUS_METERS)
        };
        Self {
            checklist_id,
            center,
            radius_meters,
        }
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    pub fn region_identifier(&self) -> String {
        region_identifier(self.checklist_id)
    }
}

/// Region identifier for a checklist: `checklist_region_{id}`.
pub fn region_identifier(checklist_id: ChecklistId) -> String {
    format!("{REGION_PREFIX}{checklist_id}")
}

/// Recover the checklist id from a region identifier, if it is one of ours.
pub fn checklist_for_region(region_identifier: &str) -> Option<ChecklistId> {
    region_identifier
        .strip_prefix(REGION_PREFIX)
        .and_then(|rest| rest.parse().ok())
}

/// Location permission as reported by the platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    #[default]
    NotDetermined,
    Granted,
    Denied,
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationStatus::NotDetermined => write!(f, "not_determined"),
            AuthorizationStatus::Granted => write!(f, "granted"),
            AuthorizationStatus::Denied => write!(f, "denied"),
        }
    }
}
