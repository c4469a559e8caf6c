use tracing::{debug, warn};

use crate::engine::pool::DriverPool;
use crate::error::DispatchError;
use crate::geo::{self, GeoPoint};
use crate::models::driver::Driver;

/// Probe schedule for the expanding search. Fields are private so an
/// invalid schedule (zero step, cap below start) cannot be constructed.
#[derive(Debug, Clone, Copy)]
pub struct RadiusPolicy {
    start_km: f64,
    step_km: f64,
    max_km: f64,
}

impl Default for RadiusPolicy {
    fn default() -> Self {
        Self { start_km: 10.0, step_km: 10.0, max_km: 50.0 }
    }
}

impl RadiusPolicy {
    pub fn new(start_km: f64, step_km: f64, max_km: f64) -> Result<Self, DispatchError> {
        let finite = start_km.is_finite() && step_km.is_finite() && max_km.is_finite();
        if !finite || start_km <= 0.0 || step_km <= 0.0 || max_km < start_km {
            return Err(DispatchError::Internal(format!(
                "invalid radius policy: start {start_km} km, step {step_km} km, max {max_km} km"
            )));
        }
        Ok(Self { start_km, step_km, max_km })
    }

    pub fn max_km(&self) -> f64 {
        self.max_km
    }

    /// Probe radii in kilometers, strictly increasing from start to max
    /// inclusive.
    pub fn steps(&self) -> impl Iterator<Item = f64> {
        let RadiusPolicy { start_km, step_km, max_km } = *self;
        let mut next = start_km;
        std::iter::from_fn(move || {
            // Tolerate float accumulation landing a hair above the cap.
            if next > max_km + 1e-9 {
                return None;
            }
            let current = next;
            next += step_km;
            Some(current)
        })
    }
}

/// A dispatchable driver found within the probed radius.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub driver: Driver,
    pub distance_km: f64,
}

/// Expanding-radius candidate discovery. Each radius is probed against a
/// fresh snapshot of available drivers, and the first radius with at least
/// one candidate wins. Candidates come back nearest-first; ties fall to the
/// higher-rated driver, then to the lower id so ordering stays stable.
pub fn search(
    pool: &DriverPool,
    location: &GeoPoint,
    policy: &RadiusPolicy,
) -> Result<Vec<Candidate>, DispatchError> {
    location.validate()?;

    for radius_km in policy.steps() {
        let mut candidates = Vec::new();

        for driver in pool.find_available() {
            let Some(position) = driver.location else {
                continue;
            };
            let distance_km = match geo::distance_km(&position, location) {
                Ok(distance_km) => distance_km,
                Err(err) => {
                    warn!(
                        driver_id = %driver.id,
                        error = %err,
                        "skipping driver with invalid stored location"
                    );
                    continue;
                }
            };
            if distance_km <= radius_km {
                candidates.push(Candidate { driver, distance_km });
            }
        }

        if candidates.is_empty() {
            debug!(radius_km, "no candidates in radius, expanding");
            continue;
        }

        candidates.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then_with(|| {
                    b.driver
                        .average_rating()
                        .total_cmp(&a.driver.average_rating())
                })
                .then_with(|| a.driver.id.cmp(&b.driver.id))
        });

        debug!(radius_km, count = candidates.len(), "candidates found");
        return Ok(candidates);
    }

    Err(DispatchError::NoDriversInRange { max_radius_km: policy.max_km })
}
