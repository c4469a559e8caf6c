use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::geo::GeoPoint;
use crate::models::driver::{Driver, DriverRating, Shift};

/// Per-driver result of one rotation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    Rotated { from: Shift, to: Shift },
    /// The SOS override marks a driver on an active call; rotation leaves it alone.
    SkippedOnCall,
    /// Unknown labels are skipped, never corrected.
    SkippedUnrecognized(String),
    Missing,
}

/// Shared registry of drivers. Every mutation happens under a single map
/// entry guard, so concurrent callers observe each driver either before or
/// after an update, never in between. Claims in particular are a single
/// check-and-flip with no suspension point.
#[derive(Default)]
pub struct DriverPool {
    drivers: DashMap<Uuid, Driver>,
}

impl DriverPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, driver: Driver) {
        self.drivers.insert(driver.id, driver);
    }

    pub fn get(&self, driver_id: Uuid) -> Option<Driver> {
        self.drivers.get(&driver_id).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<Driver> {
        self.drivers.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.drivers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn available_count(&self) -> usize {
        self.drivers
            .iter()
            .filter(|entry| entry.value().available)
            .count()
    }

    /// Snapshot of drivers that can currently take a call: available and
    /// with a known location.
    pub fn find_available(&self) -> Vec<Driver> {
        self.drivers
            .iter()
            .filter(|entry| entry.value().is_dispatchable())
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Atomically claims a driver: flips `available` to false and reports
    /// whether this caller won. Between a release and the next claim at most
    /// one concurrent caller can return true for a given driver.
    pub fn try_claim(&self, driver_id: Uuid) -> bool {
        let Some(mut driver) = self.drivers.get_mut(&driver_id) else {
            return false;
        };

        if !driver.available {
            return false;
        }

        driver.available = false;
        driver.updated_at = Utc::now();
        true
    }

    /// Binds a persisted SOS record to its claimed driver and applies the
    /// SOS shift override, stashing the previous label for release.
    pub fn commit_assignment(&self, driver_id: Uuid, sos_id: Uuid) -> bool {
        let Some(mut driver) = self.drivers.get_mut(&driver_id) else {
            return false;
        };

        driver.active_sos = Some(sos_id);
        let prior = driver.shift.clone();
        driver.previous_shift = Some(prior);
        driver.shift = Shift::Sos.label().to_string();
        driver.updated_at = Utc::now();
        true
    }

    /// Returns a driver to rotation: available again, no active SOS, and the
    /// stashed shift label reinstated.
    pub fn release(&self, driver_id: Uuid) -> bool {
        let Some(mut driver) = self.drivers.get_mut(&driver_id) else {
            return false;
        };

        driver.available = true;
        driver.active_sos = None;
        if let Some(previous) = driver.previous_shift.take() {
            driver.shift = previous;
        } else if Shift::from_label(&driver.shift) == Some(Shift::Sos) {
            // Records that predate the stash still have to rejoin the cycle.
            driver.shift = Shift::Morning.label().to_string();
        }
        driver.updated_at = Utc::now();
        true
    }

    pub fn update_location(&self, driver_id: Uuid, location: GeoPoint) -> Option<Driver> {
        let mut driver = self.drivers.get_mut(&driver_id)?;
        driver.location = Some(location);
        driver.updated_at = Utc::now();
        Some(driver.value().clone())
    }

    /// Admin shift change. Refused while the driver is on an active call so
    /// the SOS override cannot be silently overwritten.
    pub fn set_shift(&self, driver_id: Uuid, shift: Shift) -> Result<Driver, DispatchError> {
        let mut driver = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| DispatchError::NotFound(format!("driver {driver_id} not found")))?;

        if driver.active_sos.is_some() {
            return Err(DispatchError::BadRequest(format!(
                "driver {driver_id} is on an active SOS call"
            )));
        }

        driver.shift = shift.label().to_string();
        driver.updated_at = Utc::now();
        Ok(driver.value().clone())
    }

    /// Records a rating and returns the new average.
    pub fn add_rating(&self, driver_id: Uuid, rating: DriverRating) -> Option<f64> {
        let mut driver = self.drivers.get_mut(&driver_id)?;
        driver.ratings.push(rating);
        driver.updated_at = Utc::now();
        Some(driver.average_rating())
    }

    /// Advances one driver's rotation. Touches only the shift field:
    /// availability and any active SOS reference are left exactly as found.
    pub fn rotate_shift(&self, driver_id: Uuid) -> RotationOutcome {
        let Some(mut driver) = self.drivers.get_mut(&driver_id) else {
            return RotationOutcome::Missing;
        };

        match Shift::from_label(&driver.shift) {
            Some(Shift::Sos) => RotationOutcome::SkippedOnCall,
            Some(current) => {
                let next = current.next();
                driver.shift = next.label().to_string();
                driver.updated_at = Utc::now();
                RotationOutcome::Rotated { from: current, to: next }
            }
            None => RotationOutcome::SkippedUnrecognized(driver.shift.clone()),
        }
    }
}
