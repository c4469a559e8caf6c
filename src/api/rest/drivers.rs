use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::geo::GeoPoint;
use crate::models::driver::{Driver, DriverRating, Shift};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/location", patch(update_driver_location))
        .route("/drivers/:id/shift", patch(update_driver_shift))
        .route("/drivers/:id/ratings", post(add_driver_rating))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub contact_number: Option<String>,
    pub location: Option<GeoPoint>,
    pub shift: Shift,
    pub speed_kmh: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct UpdateShiftRequest {
    pub shift: Shift,
}

#[derive(Deserialize)]
pub struct RateDriverRequest {
    pub rater_id: Uuid,
    pub score: f64,
}

#[derive(Serialize)]
pub struct DriverDetail {
    #[serde(flatten)]
    pub driver: Driver,
    pub average_rating: f64,
}

#[derive(Serialize)]
pub struct RatingResponse {
    pub average_rating: f64,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, DispatchError> {
    if payload.name.trim().is_empty() {
        return Err(DispatchError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.shift == Shift::Sos {
        return Err(DispatchError::BadRequest(
            "the SOS shift is applied by dispatch, not on registration".to_string(),
        ));
    }

    if let Some(location) = &payload.location {
        location.validate()?;
    }

    let driver = Driver::new(
        payload.name,
        payload.contact_number,
        payload.location,
        payload.shift,
        payload.speed_kmh,
    );

    state.drivers.insert(driver.clone());
    state
        .metrics
        .drivers_available
        .set(state.drivers.available_count() as i64);

    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    Json(state.drivers.list())
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverDetail>, DispatchError> {
    let driver = state
        .drivers
        .get(id)
        .ok_or_else(|| DispatchError::NotFound(format!("driver {id} not found")))?;

    let average_rating = driver.average_rating();
    Ok(Json(DriverDetail { driver, average_rating }))
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, DispatchError> {
    payload.location.validate()?;

    let driver = state
        .drivers
        .update_location(id, payload.location)
        .ok_or_else(|| DispatchError::NotFound(format!("driver {id} not found")))?;

    Ok(Json(driver))
}

async fn update_driver_shift(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateShiftRequest>,
) -> Result<Json<Driver>, DispatchError> {
    if payload.shift == Shift::Sos {
        return Err(DispatchError::BadRequest(
            "the SOS shift is applied by dispatch, not by hand".to_string(),
        ));
    }

    let driver = state.drivers.set_shift(id, payload.shift)?;
    Ok(Json(driver))
}

async fn add_driver_rating(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RateDriverRequest>,
) -> Result<Json<RatingResponse>, DispatchError> {
    if !(0.0..=5.0).contains(&payload.score) {
        return Err(DispatchError::BadRequest(
            "rating must be between 0 and 5".to_string(),
        ));
    }

    let rating = DriverRating { rater_id: payload.rater_id, score: payload.score };
    let average_rating = state
        .drivers
        .add_rating(id, rating)
        .ok_or_else(|| DispatchError::NotFound(format!("driver {id} not found")))?;

    Ok(Json(RatingResponse { average_rating }))
}
