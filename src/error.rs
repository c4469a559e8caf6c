use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::sos::SosStatus;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("invalid speed: {0} km/h")]
    InvalidSpeed(f64),

    #[error("no drivers available within {max_radius_km} km")]
    NoDriversInRange { max_radius_km: f64 },

    #[error("all candidate drivers were claimed by concurrent requests")]
    AssignmentConflict,

    #[error("illegal status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SosStatus, to: SosStatus },

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            DispatchError::InvalidCoordinates { .. }
            | DispatchError::InvalidSpeed(_)
            | DispatchError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DispatchError::NoDriversInRange { .. } | DispatchError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            DispatchError::AssignmentConflict | DispatchError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            DispatchError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            DispatchError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::DispatchError;

    #[test]
    fn capacity_errors_map_to_404() {
        let response = DispatchError::NoDriversInRange { max_radius_km: 50.0 }.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn lost_races_map_to_409() {
        let response = DispatchError::AssignmentConflict.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn input_errors_map_to_400() {
        let response = DispatchError::InvalidSpeed(-1.0).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
