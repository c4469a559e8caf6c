use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::pool::RotationOutcome;
use crate::state::AppState;

/// Counts from one rotation pass over the whole pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RotationSummary {
    pub rotated: usize,
    pub skipped: usize,
}

/// Rotates every driver's duty shift on a fixed period, starting with one
/// pass at startup. Owned and spawned by the process entrypoint.
pub struct ShiftScheduler {
    state: Arc<AppState>,
    period: Duration,
}

impl ShiftScheduler {
    pub fn new(state: Arc<AppState>, period: Duration) -> Self {
        Self { state, period }
    }

    pub async fn run(self) {
        info!(period_secs = self.period.as_secs(), "shift scheduler started");

        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick resolves immediately, which is the startup pass.
            ticker.tick().await;
            let summary = rotate_all(&self.state);
            info!(
                rotated = summary.rotated,
                skipped = summary.skipped,
                "shift rotation pass finished"
            );
        }
    }
}

/// One pass over every driver currently in the pool. Each update is
/// independent: a skipped or missing record never aborts the remainder.
pub fn rotate_all(state: &AppState) -> RotationSummary {
    let mut summary = RotationSummary { rotated: 0, skipped: 0 };

    for driver_id in state.drivers.ids() {
        match state.drivers.rotate_shift(driver_id) {
            RotationOutcome::Rotated { from, to } => {
                summary.rotated += 1;
                state
                    .metrics
                    .shift_rotations_total
                    .with_label_values(&["rotated"])
                    .inc();
                debug!(driver_id = %driver_id, from = from.label(), to = to.label(), "shift rotated");
            }
            RotationOutcome::SkippedOnCall => {
                summary.skipped += 1;
                state
                    .metrics
                    .shift_rotations_total
                    .with_label_values(&["skipped"])
                    .inc();
                debug!(driver_id = %driver_id, "driver on an active call, shift untouched");
            }
            RotationOutcome::SkippedUnrecognized(label) => {
                summary.skipped += 1;
                state
                    .metrics
                    .shift_rotations_total
                    .with_label_values(&["skipped"])
                    .inc();
                warn!(driver_id = %driver_id, label = %label, "unrecognized shift label, left unchanged");
            }
            RotationOutcome::Missing => {
                summary.skipped += 1;
                state
                    .metrics
                    .shift_rotations_total
                    .with_label_values(&["skipped"])
                    .inc();
                warn!(driver_id = %driver_id, "driver disappeared mid-rotation");
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{rotate_all, RotationSummary, ShiftScheduler};
    use crate::config::Config;
    use crate::geo::GeoPoint;
    use crate::models::driver::{Driver, Shift};
    use crate::services::notify::LogPush;
    use crate::services::routing::StraightLineRouter;
    use crate::state::AppState;

    fn test_state() -> Arc<AppState> {
        let state = AppState::new(
            &Config::default(),
            Arc::new(StraightLineRouter::new()),
            Arc::new(LogPush),
        )
        .unwrap();
        Arc::new(state)
    }

    fn driver_with_shift(label: &str) -> Driver {
        let mut driver = Driver::new(
            "Asha".to_string(),
            None,
            Some(GeoPoint { latitude: 12.90, longitude: 77.58 }),
            Shift::Morning,
            None,
        );
        driver.shift = label.to_string();
        driver
    }

    #[test]
    fn rotation_pass_counts_rotations_and_skips() {
        let state = test_state();
        let morning = driver_with_shift("Morning");
        let morning_id = morning.id;
        state.drivers.insert(morning);
        let messy = driver_with_shift("night ");
        let messy_id = messy.id;
        state.drivers.insert(messy);
        let on_call = driver_with_shift("SOS");
        let on_call_id = on_call.id;
        state.drivers.insert(on_call);
        let odd = driver_with_shift("Lunch");
        let odd_id = odd.id;
        state.drivers.insert(odd);

        let summary = rotate_all(&state);

        assert_eq!(summary, RotationSummary { rotated: 2, skipped: 2 });
        assert_eq!(state.drivers.get(morning_id).unwrap().shift, "Afternoon");
        assert_eq!(state.drivers.get(messy_id).unwrap().shift, "Morning");
        assert_eq!(state.drivers.get(on_call_id).unwrap().shift, "SOS");
        assert_eq!(state.drivers.get(odd_id).unwrap().shift, "Lunch");
    }

    #[test]
    fn three_passes_complete_the_cycle() {
        let state = test_state();
        let driver = driver_with_shift("Afternoon");
        let driver_id = driver.id;
        state.drivers.insert(driver);

        for _ in 0..3 {
            rotate_all(&state);
        }

        assert_eq!(state.drivers.get(driver_id).unwrap().shift, "Afternoon");
    }

    #[test]
    fn rotation_leaves_availability_alone() {
        let state = test_state();
        let driver = driver_with_shift("Morning");
        let driver_id = driver.id;
        state.drivers.insert(driver);
        assert!(state.drivers.try_claim(driver_id));

        rotate_all(&state);

        assert!(!state.drivers.get(driver_id).unwrap().available);
    }

    #[tokio::test]
    async fn scheduler_runs_a_pass_at_startup() {
        let state = test_state();
        let driver = driver_with_shift("Morning");
        let driver_id = driver.id;
        state.drivers.insert(driver);

        // Period far beyond the test: only the immediate startup pass fires.
        let period = Duration::from_secs(3600);
        tokio::spawn(ShiftScheduler::new(state.clone(), period).run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.drivers.get(driver_id).unwrap().shift, "Afternoon");
    }
}
