use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::geo::{self, GeoPoint};
use crate::models::driver::Driver;
use crate::models::sos::SosRequest;
use crate::services::routing::{self, Facility, FacilityKind, RouteProvider};

/// Push payloads, tagged the way the mobile clients already consume them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    /// Sent to the claimed driver.
    #[serde(rename = "SOS")]
    Sos {
        sos_id: Uuid,
        location: GeoPoint,
        distance_km: f64,
        eta_minutes: u64,
        map_link: String,
        route_summary: Option<String>,
    },
    /// Sent to the requester once a driver is on the way.
    #[serde(rename = "AMBULANCE_ON_THE_WAY")]
    AmbulanceOnTheWay {
        message: String,
        hospital_name: String,
        distance_km: f64,
        eta_minutes: u64,
        speed_kmh: f64,
        map_link: String,
    },
}

/// Narrow interface over the push provider. Delivery is best-effort.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, recipient: Uuid, notification: &Notification)
        -> Result<(), DispatchError>;
}

/// Stand-in sender for deployments without a push provider: writes the
/// payload to the log.
pub struct LogPush;

#[async_trait]
impl PushSender for LogPush {
    async fn send(
        &self,
        recipient: Uuid,
        notification: &Notification,
    ) -> Result<(), DispatchError> {
        let payload = serde_json::to_string(notification)
            .map_err(|err| DispatchError::Internal(format!("notification payload: {err}")))?;
        info!(recipient = %recipient, payload, "notification");
        Ok(())
    }
}

/// Builds and sends the two dispatch notifications. Both sides are
/// best-effort: the callers log failures and move on.
pub struct NotificationDispatcher {
    routes: Arc<dyn RouteProvider>,
    push: Arc<dyn PushSender>,
    default_speed_kmh: f64,
}

impl NotificationDispatcher {
    pub fn new(
        routes: Arc<dyn RouteProvider>,
        push: Arc<dyn PushSender>,
        default_speed_kmh: f64,
    ) -> Self {
        Self { routes, push, default_speed_kmh }
    }

    /// Alerts the claimed driver with the requester's position and a
    /// directions link. Route detail is decoration: the alert still goes out
    /// when the provider has no answer.
    pub async fn notify_driver(
        &self,
        driver: &Driver,
        sos: &SosRequest,
    ) -> Result<(), DispatchError> {
        let Some(position) = driver.location else {
            return Err(DispatchError::Internal(format!(
                "driver {} claimed without a known location",
                driver.id
            )));
        };

        let distance_km = geo::distance_km(&position, &sos.location)?;
        let speed_kmh = driver.effective_speed_kmh(self.default_speed_kmh);
        let eta_minutes = geo::eta_minutes(&position, &sos.location, speed_kmh)?;

        let route_summary = match routing::with_retries("directions", || {
            self.routes.directions(&position, &sos.location)
        })
        .await
        {
            Ok(route) => Some(route.summary),
            Err(err) => {
                warn!(driver_id = %driver.id, error = %err, "directions unavailable for driver alert");
                None
            }
        };

        let notification = Notification::Sos {
            sos_id: sos.id,
            location: sos.location,
            distance_km,
            eta_minutes,
            map_link: routing::map_link(&position, &sos.location),
            route_summary,
        };

        self.push.send(driver.id, &notification).await
    }

    /// Tells the requester which hospital the ambulance is heading for, with
    /// distance and ETA from their own position at the driver's speed. The
    /// map link follows the ambulance, not the requester.
    pub async fn notify_requester(
        &self,
        sos: &SosRequest,
        driver: &Driver,
        destination: &Facility,
    ) -> Result<(), DispatchError> {
        let speed_kmh = driver.effective_speed_kmh(self.default_speed_kmh);
        let distance_km = geo::distance_km(&sos.location, &destination.location)?;
        let eta_minutes = geo::eta_minutes(&sos.location, &destination.location, speed_kmh)?;

        let origin = driver.location.unwrap_or(sos.location);
        let notification = Notification::AmbulanceOnTheWay {
            message: format!(
                "Ambulance is on the way to your location and heading to {}.",
                destination.name
            ),
            hospital_name: destination.name.clone(),
            distance_km,
            eta_minutes,
            speed_kmh,
            map_link: routing::map_link(&origin, &destination.location),
        };

        self.push.send(sos.requester_id, &notification).await
    }

    /// Facility lookup for the requester notification, behind the retry
    /// policy.
    pub async fn nearest_hospital(&self, location: &GeoPoint) -> Result<Facility, DispatchError> {
        routing::with_retries("nearby_facility", || {
            self.routes.nearby_facility(location, FacilityKind::Hospital)
        })
        .await
    }
}
