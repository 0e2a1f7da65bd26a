use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::controllers::error_response;
use crate::controllers::solar_controller::spawn_sweep;
use crate::models::polygon::{NewPolygon, Polygon};
use crate::models::system::ApiError;
use crate::services::pipeline::SolarPipeline;
use crate::shared_state::AppState;

/// GET /api/polygons
/// List all stored polygons, oldest first
#[utoipa::path(
    get,
    path = "/api/polygons",
    responses(
        (status = 200, description = "Stored polygons", body = Vec<Polygon>)
    )
)]
pub async fn list_polygons(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.list_polygons()).into_response()
}

/// POST /api/polygons
/// Store a new polygon
///
/// The ring is given as `[lng, lat]` pairs. Once stored, a background sweep
/// computes solar data for every polygon that does not have it yet.
#[utoipa::path(
    post,
    path = "/api/polygons",
    request_body = NewPolygon,
    responses(
        (status = 201, description = "Polygon stored", body = Polygon),
        (status = 400, description = "Invalid coordinates", body = ApiError)
    )
)]
pub async fn create_polygon(
    State(state): State<AppState>,
    State(pipeline): State<Arc<SolarPipeline>>,
    Json(body): Json<NewPolygon>,
) -> impl IntoResponse {
    if let Err(e) = body.validate() {
        return error_response(StatusCode::BAD_REQUEST, e);
    }
    let polygon = match state.insert_polygon(body.into_polygon()) {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };
    info!(polygon_id = %polygon.id, points = polygon.coordinates.len(), "polygon created");
    spawn_sweep(state, pipeline);
    (StatusCode::CREATED, Json(polygon)).into_response()
}

/// GET /api/polygons/{id}
#[utoipa::path(
    get,
    path = "/api/polygons/{id}",
    params(
        ("id" = String, Path, description = "Polygon id")
    ),
    responses(
        (status = 200, description = "The polygon", body = Polygon),
        (status = 404, description = "Polygon not found", body = ApiError)
    )
)]
pub async fn get_polygon(Path(id): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    match state.get_polygon(&id) {
        Some(p) => (StatusCode::OK, Json(p)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Polygon not found"),
    }
}

/// DELETE /api/polygons/{id}
/// Remove a polygon and its solar records
#[utoipa::path(
    delete,
    path = "/api/polygons/{id}",
    params(
        ("id" = String, Path, description = "Polygon id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Polygon not found", body = ApiError)
    )
)]
pub async fn delete_polygon(Path(id): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    if state.delete_polygon(&id) {
        info!(polygon_id = %id, "polygon deleted");
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, "Polygon not found")
    }
}
