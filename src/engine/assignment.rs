use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::search::{self, Candidate};
use crate::error::DispatchError;
use crate::geo::GeoPoint;
use crate::models::dispatch::{Dispatch, DriverSummary};
use crate::models::driver::Driver;
use crate::models::sos::SosRequest;
use crate::state::AppState;

/// Claims the nearest available driver for an SOS request and records the
/// dispatch. Instrumented wrapper around [`run_assignment`]: every call lands
/// in the latency histogram and outcome counter exactly once.
pub async fn assign(
    state: &AppState,
    requester_id: Uuid,
    location: GeoPoint,
) -> Result<Dispatch, DispatchError> {
    let start = Instant::now();
    let result = run_assignment(state, requester_id, location).await;

    let outcome = match &result {
        Ok(_) => "assigned",
        Err(DispatchError::NoDriversInRange { .. }) => "no_drivers",
        Err(DispatchError::AssignmentConflict) => "conflict",
        Err(_) => "error",
    };
    let elapsed = start.elapsed().as_secs_f64();
    state
        .metrics
        .dispatch_latency_seconds
        .with_label_values(&[outcome])
        .observe(elapsed);
    state
        .metrics
        .dispatches_total
        .with_label_values(&[outcome])
        .inc();

    if let Err(err) = &result {
        warn!(requester_id = %requester_id, error = %err, "sos request not assigned");
    }

    result
}

/// The claim and the SOS record are one logical unit: a driver is only left
/// claimed if the record was persisted, and a persistence failure rolls the
/// claim back before the error surfaces.
async fn run_assignment(
    state: &AppState,
    requester_id: Uuid,
    location: GeoPoint,
) -> Result<Dispatch, DispatchError> {
    // One search pass, plus a single re-probe for the race where every
    // candidate was claimed underneath us before the pool emptied.
    let claimed = match claim_nearest(state, &location)? {
        Some(candidate) => candidate,
        None => match claim_nearest(state, &location)? {
            Some(candidate) => candidate,
            None => return Err(DispatchError::AssignmentConflict),
        },
    };
    let driver_id = claimed.driver.id;

    let mut sos = SosRequest::new(requester_id, location);
    if let Err(err) = sos.assign_driver(driver_id) {
        state.drivers.release(driver_id);
        return Err(err);
    }

    if let Err(err) = state.sos.record(sos.clone()) {
        state.drivers.release(driver_id);
        warn!(driver_id = %driver_id, error = %err, "sos record rejected, claim rolled back");
        return Err(err);
    }

    state.drivers.commit_assignment(driver_id, sos.id);
    state
        .metrics
        .drivers_available
        .set(state.drivers.available_count() as i64);

    // Post-override snapshot, so the response carries the SOS shift label.
    let driver = state.drivers.get(driver_id).unwrap_or(claimed.driver);

    let speed_kmh = driver.effective_speed_kmh(state.default_speed_kmh);
    let eta_minutes = (claimed.distance_km / speed_kmh * 60.0).ceil() as u64;

    notify_parties(state, &driver, &sos).await;

    let dispatch = Dispatch {
        sos,
        driver: DriverSummary::from(&driver),
        distance_km: claimed.distance_km,
        eta_minutes,
        assigned_at: Utc::now(),
    };

    let _ = state.dispatch_events_tx.send(dispatch.clone());

    info!(
        sos_id = %dispatch.sos.id,
        driver_id = %driver_id,
        distance_km = claimed.distance_km,
        eta_minutes,
        "sos assigned"
    );

    Ok(dispatch)
}

/// One search pass followed by claim attempts in candidate order. `Ok(None)`
/// means candidates existed but every claim lost to a concurrent request.
fn claim_nearest(
    state: &AppState,
    location: &GeoPoint,
) -> Result<Option<Candidate>, DispatchError> {
    let candidates = search::search(&state.drivers, location, &state.radius_policy)?;

    for candidate in candidates {
        if state.drivers.try_claim(candidate.driver.id) {
            return Ok(Some(candidate));
        }
        debug!(driver_id = %candidate.driver.id, "candidate already claimed, trying next");
    }

    Ok(None)
}

/// Best-effort notifications. Failures are logged and counted, never
/// propagated: the dispatch already happened.
async fn notify_parties(state: &AppState, driver: &Driver, sos: &SosRequest) {
    match state.notifier.notify_driver(driver, sos).await {
        Ok(()) => {
            state
                .metrics
                .notifications_total
                .with_label_values(&["sent"])
                .inc();
        }
        Err(err) => {
            state
                .metrics
                .notifications_total
                .with_label_values(&["failed"])
                .inc();
            warn!(driver_id = %driver.id, error = %err, "driver notification failed");
        }
    }

    match state.notifier.nearest_hospital(&sos.location).await {
        Ok(facility) => match state.notifier.notify_requester(sos, driver, &facility).await {
            Ok(()) => {
                state
                    .metrics
                    .notifications_total
                    .with_label_values(&["sent"])
                    .inc();
            }
            Err(err) => {
                state
                    .metrics
                    .notifications_total
                    .with_label_values(&["failed"])
                    .inc();
                warn!(sos_id = %sos.id, error = %err, "requester notification failed");
            }
        },
        Err(err) => {
            state
                .metrics
                .notifications_total
                .with_label_values(&["failed"])
                .inc();
            warn!(sos_id = %sos.id, error = %err, "no facility found for requester notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::assign;
    use crate::config::Config;
    use crate::error::DispatchError;
    use crate::geo::GeoPoint;
    use crate::models::driver::{Driver, Shift};
    use crate::models::sos::SosStatus;
    use crate::services::notify::LogPush;
    use crate::services::routing::StraightLineRouter;
    use crate::state::AppState;

    fn test_state(config: &Config) -> Arc<AppState> {
        let state = AppState::new(
            config,
            Arc::new(StraightLineRouter::new()),
            Arc::new(LogPush),
        )
        .unwrap();
        Arc::new(state)
    }

    fn driver_at(latitude: f64, longitude: f64) -> Driver {
        Driver::new(
            "Asha".to_string(),
            Some("+91-98450-00000".to_string()),
            Some(GeoPoint { latitude, longitude }),
            Shift::Morning,
            None,
        )
    }

    #[tokio::test]
    async fn assigns_nearest_driver_and_records_request() {
        let state = test_state(&Config::default());
        let near = driver_at(12.90, 77.58);
        let near_id = near.id;
        state.drivers.insert(near);
        state.drivers.insert(driver_at(12.95, 77.62));

        let requester_id = Uuid::new_v4();
        let location = GeoPoint { latitude: 12.91, longitude: 77.59 };
        let dispatch = assign(&state, requester_id, location).await.unwrap();

        assert_eq!(dispatch.driver.id, near_id);
        assert_eq!(dispatch.sos.status, SosStatus::Assigned);
        assert_eq!(dispatch.sos.driver_id, Some(near_id));
        assert_eq!(dispatch.distance_km, 1.55);
        assert_eq!(dispatch.eta_minutes, 3);
        assert_eq!(dispatch.driver.shift, "SOS");

        let claimed = state.drivers.get(near_id).unwrap();
        assert!(!claimed.available);
        assert_eq!(claimed.active_sos, Some(dispatch.sos.id));
        assert_eq!(state.sos.get(dispatch.sos.id).unwrap().driver_id, Some(near_id));
    }

    #[tokio::test]
    async fn empty_pool_reports_no_drivers() {
        let state = test_state(&Config::default());

        let location = GeoPoint { latitude: 12.91, longitude: 77.59 };
        let err = assign(&state, Uuid::new_v4(), location).await.unwrap_err();

        assert!(matches!(err, DispatchError::NoDriversInRange { .. }));
        assert!(state.sos.is_empty());
    }

    #[tokio::test]
    async fn concurrent_requests_claim_one_driver_exactly_once() {
        let state = test_state(&Config::default());
        let driver = driver_at(12.90, 77.58);
        let driver_id = driver.id;
        state.drivers.insert(driver);

        let location = GeoPoint { latitude: 12.91, longitude: 77.59 };
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { assign(&state, Uuid::new_v4(), location).await })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(dispatch) => {
                    wins += 1;
                    assert_eq!(dispatch.driver.id, driver_id);
                }
                Err(DispatchError::NoDriversInRange { .. })
                | Err(DispatchError::AssignmentConflict) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(state.sos.len(), 1);
        assert!(!state.drivers.get(driver_id).unwrap().available);
    }

    #[tokio::test]
    async fn persistence_failure_rolls_the_claim_back() {
        let config = Config { sos_ledger_capacity: 0, ..Config::default() };
        let state = test_state(&config);
        let driver = driver_at(12.90, 77.58);
        let driver_id = driver.id;
        state.drivers.insert(driver);

        let location = GeoPoint { latitude: 12.91, longitude: 77.59 };
        let err = assign(&state, Uuid::new_v4(), location).await.unwrap_err();

        assert!(matches!(err, DispatchError::Persistence(_)));
        let driver = state.drivers.get(driver_id).unwrap();
        assert!(driver.available);
        assert_eq!(driver.active_sos, None);
        assert_eq!(driver.shift, "Morning");
        assert!(state.sos.is_empty());
    }

    #[tokio::test]
    async fn second_request_falls_to_the_remaining_driver() {
        let state = test_state(&Config::default());
        let near = driver_at(12.90, 77.58);
        let near_id = near.id;
        state.drivers.insert(near);
        let far = driver_at(12.95, 77.62);
        let far_id = far.id;
        state.drivers.insert(far);

        let location = GeoPoint { latitude: 12.91, longitude: 77.59 };
        let first = assign(&state, Uuid::new_v4(), location).await.unwrap();
        let second = assign(&state, Uuid::new_v4(), location).await.unwrap();

        assert_eq!(first.driver.id, near_id);
        assert_eq!(second.driver.id, far_id);
        assert_eq!(state.drivers.available_count(), 0);
    }
}
