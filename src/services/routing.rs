use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use crate::error::DispatchError;
use crate::geo::{self, GeoPoint};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Provider-side failure classes. Only `Unavailable` is worth retrying;
/// `Invalid` means the request itself was malformed.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid routing request: {0}")]
    Invalid(String),
    #[error("routing service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct Route {
    pub distance_km: f64,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilityKind {
    Hospital,
}

impl FacilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityKind::Hospital => "hospital",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Facility {
    pub name: String,
    pub location: GeoPoint,
    pub kind: FacilityKind,
}

/// Narrow interface over the external routing and places service.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn directions(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<Route, RouteError>;

    async fn nearby_facility(
        &self,
        location: &GeoPoint,
        kind: FacilityKind,
    ) -> Result<Facility, RouteError>;
}

/// Runs a provider call with bounded retries: up to three attempts in total,
/// only `Unavailable` failures retried, and the terminal error surfaced as
/// `ExternalService`.
pub async fn with_retries<T, F, Fut>(operation: &str, mut call: F) -> Result<T, DispatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RouteError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(RouteError::Invalid(reason)) => {
                return Err(DispatchError::ExternalService(format!("{operation}: {reason}")));
            }
            Err(RouteError::Unavailable(reason)) => {
                if attempt >= MAX_ATTEMPTS {
                    return Err(DispatchError::ExternalService(format!(
                        "{operation} failed after {MAX_ATTEMPTS} attempts: {reason}"
                    )));
                }
                warn!(operation, attempt, error = %reason, "routing call failed, retrying");
                attempt += 1;
                sleep(RETRY_DELAY).await;
            }
        }
    }
}

/// Directions deep link in the format the mobile clients already consume.
pub fn map_link(origin: &GeoPoint, destination: &GeoPoint) -> String {
    format!(
        "https://www.google.com/maps/dir/?api=1&origin={},{}&destination={},{}",
        origin.latitude, origin.longitude, destination.latitude, destination.longitude
    )
}

/// Deterministic in-process provider used when no external routing service is
/// wired in: great-circle routes plus a seeded facility registry.
#[derive(Default)]
pub struct StraightLineRouter {
    facilities: Vec<Facility>,
}

impl StraightLineRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facilities(facilities: Vec<Facility>) -> Self {
        Self { facilities }
    }
}

#[async_trait]
impl RouteProvider for StraightLineRouter {
    async fn directions(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<Route, RouteError> {
        let distance_km = geo::distance_km(origin, destination)
            .map_err(|err| RouteError::Invalid(err.to_string()))?;
        Ok(Route { distance_km, summary: format!("direct route, {distance_km} km") })
    }

    async fn nearby_facility(
        &self,
        location: &GeoPoint,
        kind: FacilityKind,
    ) -> Result<Facility, RouteError> {
        location
            .validate()
            .map_err(|err| RouteError::Invalid(err.to_string()))?;

        self.facilities
            .iter()
            .filter(|facility| facility.kind == kind)
            .filter_map(|facility| {
                geo::distance_km(&facility.location, location)
                    .ok()
                    .map(|distance_km| (facility, distance_km))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(facility, _)| facility.clone())
            .ok_or_else(|| {
                RouteError::Unavailable(format!("no {} registered", kind.as_str()))
            })
    }
}
