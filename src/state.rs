use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::pool::DriverPool;
use crate::engine::search::RadiusPolicy;
use crate::error::DispatchError;
use crate::models::dispatch::Dispatch;
use crate::models::sos::SosRequest;
use crate::observability::metrics::Metrics;
use crate::services::notify::{NotificationDispatcher, PushSender};
use crate::services::routing::RouteProvider;

/// Bounded in-memory SOS store. The capacity bound is what gives the
/// claim-rollback path a real failure mode to hit.
pub struct SosLedger {
    records: DashMap<Uuid, SosRequest>,
    capacity: usize,
}

impl SosLedger {
    pub fn bounded(capacity: usize) -> Self {
        Self { records: DashMap::new(), capacity }
    }

    pub fn record(&self, request: SosRequest) -> Result<(), DispatchError> {
        if self.records.len() >= self.capacity {
            return Err(DispatchError::Persistence(format!(
                "sos ledger full at {} records",
                self.capacity
            )));
        }
        self.records.insert(request.id, request);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<SosRequest> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<SosRequest> {
        self.records.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Applies a status change to one record under its entry guard and
    /// returns the updated record.
    pub fn update(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut SosRequest) -> Result<(), DispatchError>,
    ) -> Result<SosRequest, DispatchError> {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or_else(|| DispatchError::NotFound(format!("sos request {id} not found")))?;
        apply(entry.value_mut())?;
        Ok(entry.value().clone())
    }
}

pub struct AppState {
    pub drivers: DriverPool,
    pub sos: SosLedger,
    pub radius_policy: RadiusPolicy,
    pub default_speed_kmh: f64,
    pub notifier: NotificationDispatcher,
    pub dispatch_events_tx: broadcast::Sender<Dispatch>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: &Config,
        routes: Arc<dyn RouteProvider>,
        push: Arc<dyn PushSender>,
    ) -> Result<Self, DispatchError> {
        let radius_policy = RadiusPolicy::new(
            config.start_radius_km,
            config.radius_step_km,
            config.max_radius_km,
        )?;
        let (dispatch_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Ok(Self {
            drivers: DriverPool::new(),
            sos: SosLedger::bounded(config.sos_ledger_capacity),
            radius_policy,
            default_speed_kmh: config.default_speed_kmh,
            notifier: NotificationDispatcher::new(routes, push, config.default_speed_kmh),
            dispatch_events_tx,
            metrics: Metrics::new(),
        })
    }
}
