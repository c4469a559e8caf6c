use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::driver::Driver;
use crate::models::sos::SosRequest;

/// Public view of the claimed driver, shipped in dispatch responses and
/// websocket events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSummary {
    pub id: Uuid,
    pub name: String,
    pub contact_number: Option<String>,
    pub location: Option<GeoPoint>,
    pub shift: String,
    pub rating: f64,
}

impl From<&Driver> for DriverSummary {
    fn from(driver: &Driver) -> Self {
        Self {
            id: driver.id,
            name: driver.name.clone(),
            contact_number: driver.contact_number.clone(),
            location: driver.location,
            shift: driver.shift.clone(),
            rating: driver.average_rating(),
        }
    }
}

/// Outcome of a successful dispatch: the persisted SOS record plus the
/// claimed driver and its routing estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatch {
    pub sos: SosRequest,
    pub driver: DriverSummary,
    pub distance_km: f64,
    pub eta_minutes: u64,
    pub assigned_at: DateTime<Utc>,
}
