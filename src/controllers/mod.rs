pub mod polygon_controller;
pub mod solar_controller;

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use tracing::error;

use crate::error::SolarError;
use crate::models::system::ApiError;

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiError { error: message.into() })).into_response()
}

impl IntoResponse for SolarError {
    fn into_response(self) -> Response {
        let status = match &self {
            SolarError::InvalidGeometry(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SolarError::PolygonNotFound(_) => StatusCode::NOT_FOUND,
            SolarError::WeatherUnavailable(_) | SolarError::MalformedSeries(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        error_response(status, self.to_string())
    }
}
