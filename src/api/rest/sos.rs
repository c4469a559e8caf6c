use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::assignment;
use crate::engine::scheduler::{self, RotationSummary};
use crate::error::DispatchError;
use crate::geo::GeoPoint;
use crate::models::dispatch::Dispatch;
use crate::models::sos::SosRequest;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sos", post(create_sos).get(list_sos))
        .route("/sos/:id", get(get_sos))
        .route("/sos/:id/complete", post(complete_sos))
        .route("/shifts/rotate", post(rotate_shifts))
}

#[derive(Deserialize)]
pub struct CreateSosRequest {
    pub requester_id: Uuid,
    pub location: GeoPoint,
}

async fn create_sos(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSosRequest>,
) -> Result<Json<Dispatch>, DispatchError> {
    let dispatch = assignment::assign(&state, payload.requester_id, payload.location).await?;
    Ok(Json(dispatch))
}

async fn list_sos(State(state): State<Arc<AppState>>) -> Json<Vec<SosRequest>> {
    Json(state.sos.list())
}

async fn get_sos(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SosRequest>, DispatchError> {
    let sos = state
        .sos
        .get(id)
        .ok_or_else(|| DispatchError::NotFound(format!("sos request {id} not found")))?;
    Ok(Json(sos))
}

async fn complete_sos(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SosRequest>, DispatchError> {
    let sos = state.sos.update(id, |record| record.complete())?;

    if let Some(driver_id) = sos.driver_id {
        state.drivers.release(driver_id);
        state
            .metrics
            .drivers_available
            .set(state.drivers.available_count() as i64);
        info!(sos_id = %sos.id, driver_id = %driver_id, "driver released after completion");
    }

    Ok(Json(sos))
}

async fn rotate_shifts(State(state): State<Arc<AppState>>) -> Json<RotationSummary> {
    Json(scheduler::rotate_all(&state))
}
