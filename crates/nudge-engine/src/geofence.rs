//! Geofence monitor.
//!
//! Keeps at most one exit-only region per checklist registered with the
//! platform location service and turns region exits into a `ChecklistDue`
//! event plus one immediate alert. Regions stay registered after an exit
//! until they are disabled.
//!
//! Authorization is tracked apart from regions. A single ad-hoc "current
//! location" request can wait for authorization to resolve and is replayed
//! when it does.

use std::collections::HashMap;
use std::sync::Arc;

use nudge_core::config::GeofenceConfig;
use nudge_core::types::{
    checklist_for_region, AuthorizationStatus, ChecklistId, Coordinate, GeofenceBinding,
    NotificationId,
};
use nudge_core::DomainEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::bus::EventBus;
use crate::coordinator::Coordinator;
use crate::error::{LocationError, SchedulingError};
use crate::locks::KeyedLocks;
use crate::ports::LocationService;

/// Region handed to the location service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircularRegion {
    pub identifier: String,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub notify_on_entry: bool,
    pub notify_on_exit: bool,
}

impl From<&GeofenceBinding> for CircularRegion {
    /// Only departures are monitored.
    fn from(binding: &GeofenceBinding) -> Self {
        Self {
            identifier: binding.region_identifier(),
            center: binding.center,
            radius_meters: binding.radius_meters(),
            notify_on_entry: false,
            notify_on_exit: true,
        }
    }
}

/// Result of asking for the current location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationRequest {
    Resolved(Coordinate),
    /// Waiting on authorization; the result arrives through
    /// [`GeofenceMonitor::handle_authorization_change`].
    Deferred,
}

#[derive(Debug, Default)]
struct MonitorState {
    regions: HashMap<ChecklistId, GeofenceBinding>,
    authorization: AuthorizationStatus,
    pending_location_request: bool,
    last_known_location: Option<Coordinate>,
}

pub struct GeofenceMonitor {
    location: Arc<dyn LocationService>,
    coordinator: Arc<Coordinator>,
    events: EventBus,
    default_radius_meters: f64,
    state: Mutex<MonitorState>,
    /// Serializes enable/disable per checklist. `state` is never held across
    /// a location service call.
    region_locks: KeyedLocks<ChecklistId>,
}

impl GeofenceMonitor {
    pub fn new(
        location: Arc<dyn LocationService>,
        coordinator: Arc<Coordinator>,
        config: &GeofenceConfig,
    ) -> Self {
        let events = coordinator.events().clone();
        Self {
            location,
            coordinator,
            events,
            default_radius_meters: config.default_radius_meters,
            state: Mutex::new(MonitorState::default()),
            region_locks: KeyedLocks::new(),
        }
    }

    /// Register the exit region for a checklist, replacing any earlier one.
    ///
    /// `radius_meters` falls back to the configured default and is clamped
    /// into the allowed range. Authorization is requested when it has not
    /// been asked for yet.
    pub async fn enable(
        &self,
        checklist_id: ChecklistId,
        center: Coordinate,
        radius_meters: Option<f64>,
    ) -> Result<GeofenceBinding, LocationError> {
        if !self.location.is_monitoring_available() {
            tracing::warn!(%checklist_id, "Region monitoring unavailable");
            return Err(LocationError::MonitoringUnavailable);
        }

        let status = self.location.authorization_status().await;
        self.state.lock().await.authorization = status;
        match status {
            AuthorizationStatus::Denied => {
                tracing::warn!(%checklist_id, "Location authorization denied, geofence not enabled");
                return Err(LocationError::AuthorizationDenied);
            }
            AuthorizationStatus::NotDetermined => {
                self.location.request_authorization().await;
            }
            AuthorizationStatus::Granted => {}
        }

        let binding = GeofenceBinding::new(
            checklist_id,
            center,
            radius_meters.unwrap_or(self.default_radius_meters),
        );
        let region = CircularRegion::from(&binding);

        let _guard = self.region_locks.lock(&checklist_id).await;
        let previous = self.state.lock().await.regions.remove(&checklist_id);
        if let Some(previous) = previous {
            self.location
                .stop_monitoring(&previous.region_identifier())
                .await;
            tracing::debug!(%checklist_id, "Replaced previous region");
        }
        self.location
            .start_monitoring(&region)
            .await
            .map_err(|e| match e {
                LocationError::PositionUnavailable(reason) => {
                    LocationError::Registration(format!("{}: {reason}", region.identifier))
                }
                other => other,
            })?;
        self.state
            .lock()
            .await
            .regions
            .insert(checklist_id, binding.clone());

        tracing::info!(
            %checklist_id,
            region = %region.identifier,
            radius_meters = region.radius_meters,
            "Geofence enabled"
        );
        self.events.publish(DomainEvent::GeofenceEnabled {
            checklist_id,
            region_identifier: region.identifier,
            radius_meters: region.radius_meters,
            timestamp: self.coordinator.clock().now(),
        });
        Ok(binding)
    }

    /// Stop monitoring a checklist's region. Returns whether one was active.
    pub async fn disable(&self, checklist_id: ChecklistId) -> bool {
        let _guard = self.region_locks.lock(&checklist_id).await;
        let Some(binding) = self.state.lock().await.regions.remove(&checklist_id) else {
            return false;
        };
        let region_identifier = binding.region_identifier();
        self.location.stop_monitoring(&region_identifier).await;

        tracing::info!(%checklist_id, region = %region_identifier, "Geofence disabled");
        self.events.publish(DomainEvent::GeofenceDisabled {
            checklist_id,
            region_identifier,
            timestamp: self.coordinator.clock().now(),
        });
        true
    }

    /// Platform callback for a region exit.
    ///
    /// Identifiers this monitor did not derive are ignored. The region stays
    /// registered.
    pub async fn handle_region_exit(
        &self,
        region_identifier: &str,
    ) -> Result<Option<NotificationId>, SchedulingError> {
        let Some(checklist_id) = checklist_for_region(region_identifier) else {
            tracing::debug!(region = %region_identifier, "Ignoring exit for foreign region");
            return Ok(None);
        };

        self.events.publish(DomainEvent::ChecklistDue {
            checklist_id,
            timestamp: self.coordinator.clock().now(),
        });
        let identifier = self.coordinator.schedule_immediate(checklist_id).await?;
        Ok(Some(identifier))
    }

    /// Ask for a single current position.
    ///
    /// When authorization is undetermined the request is parked in a single
    /// slot (a second call does not queue another) and replayed once
    /// authorization resolves.
    pub async fn request_current_location(&self) -> Result<LocationRequest, LocationError> {
        let status = self.location.authorization_status().await;
        {
            let mut state = self.state.lock().await;
            state.authorization = status;
            match status {
                AuthorizationStatus::Granted => {}
                AuthorizationStatus::NotDetermined => {
                    state.pending_location_request = true;
                }
                AuthorizationStatus::Denied => {
                    state.pending_location_request = false;
                }
            }
        }

        match status {
            AuthorizationStatus::Granted => self.resolve_location().await.map(LocationRequest::Resolved),
            AuthorizationStatus::NotDetermined => {
                tracing::debug!("Deferring location request until authorization resolves");
                self.location.request_authorization().await;
                Ok(LocationRequest::Deferred)
            }
            AuthorizationStatus::Denied => {
                tracing::warn!("Location request refused, authorization denied");
                Err(LocationError::AuthorizationDenied)
            }
        }
    }

    /// Platform callback for an authorization change.
    ///
    /// Returns the outcome of a replayed location request, if one was parked.
    pub async fn handle_authorization_change(
        &self,
        status: AuthorizationStatus,
    ) -> Option<Result<Coordinate, LocationError>> {
        let replay = {
            let mut state = self.state.lock().await;
            state.authorization = status;
            match status {
                AuthorizationStatus::NotDetermined => false,
                AuthorizationStatus::Granted | AuthorizationStatus::Denied => {
                    std::mem::take(&mut state.pending_location_request)
                }
            }
        };

        tracing::info!(%status, "Location authorization changed");
        self.events.publish(DomainEvent::LocationAuthorizationChanged {
            status,
            timestamp: self.coordinator.clock().now(),
        });

        if !replay {
            return None;
        }
        match status {
            AuthorizationStatus::Granted => Some(self.resolve_location().await),
            _ => {
                self.publish_location_failure(&LocationError::AuthorizationDenied);
                Some(Err(LocationError::AuthorizationDenied))
            }
        }
    }

    async fn resolve_location(&self) -> Result<Coordinate, LocationError> {
        match self.location.request_one_shot_location().await {
            Ok(coordinate) => {
                self.state.lock().await.last_known_location = Some(coordinate);
                self.events.publish(DomainEvent::LocationResolved {
                    coordinate,
                    timestamp: self.coordinator.clock().now(),
                });
                Ok(coordinate)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Location request failed");
                self.publish_location_failure(&e);
                Err(e)
            }
        }
    }

    fn publish_location_failure(&self, error: &LocationError) {
        self.events.publish(DomainEvent::LocationFailed {
            reason: error.to_string(),
            timestamp: self.coordinator.clock().now(),
        });
    }

    pub async fn active_regions(&self) -> Vec<GeofenceBinding> {
        self.state.lock().await.regions.values().cloned().collect()
    }

    pub async fn authorization(&self) -> AuthorizationStatus {
        self.state.lock().await.authorization
    }

    pub async fn last_known_location(&self) -> Option<Coordinate> {
        self.state.lock().await.last_known_location
    }

    pub async fn has_pending_location_request(&self) -> bool {
        self.state.lock().await.pending_location_request
    }
}
