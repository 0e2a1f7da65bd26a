use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;

use crate::config::Config;
use crate::controllers::error_response;
use crate::models::records::DayAggregate;
use crate::models::system::{ApiError, SystemConfig};
use crate::services::pipeline::{PolygonSource, SimulationReport, SolarPipeline, SweepSummary};
use crate::shared_state::AppState;

/// Runs a sweep on the blocking pool without waiting for it. If one is
/// already running it picks the new work up instead.
pub fn spawn_sweep(state: AppState, pipeline: Arc<SolarPipeline>) {
    tokio::task::spawn_blocking(move || {
        state.sweep_exclusive(&pipeline);
    });
}

/// POST /api/polygons/{id}/solar
/// Run the solar simulation for one polygon
///
/// Fetches the typical-year weather for the polygon centroid, simulates every
/// hour and stores the daily aggregates. Monthly and yearly rollups are
/// returned but not stored.
#[utoipa::path(
    post,
    path = "/api/polygons/{id}/solar",
    params(
        ("id" = String, Path, description = "Polygon id")
    ),
    responses(
        (status = 200, description = "Simulation result", body = SimulationReport),
        (status = 404, description = "Polygon not found", body = ApiError),
        (status = 422, description = "Polygon is not a valid simple ring", body = ApiError),
        (status = 502, description = "Weather service unavailable", body = ApiError)
    )
)]
pub async fn run_polygon_solar(
    Path(id): Path<String>,
    State(state): State<AppState>,
    State(pipeline): State<Arc<SolarPipeline>>,
) -> impl IntoResponse {
    let result = tokio::task::spawn_blocking(move || pipeline.run_for_polygon(&state, &state, &id)).await;
    match result {
        Ok(Ok(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => {
            error!(error = %e, "simulation task panicked");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "simulation task failed")
        }
    }
}

/// GET /api/polygons/{id}/solar
/// Stored daily records for one polygon
#[utoipa::path(
    get,
    path = "/api/polygons/{id}/solar",
    params(
        ("id" = String, Path, description = "Polygon id")
    ),
    responses(
        (status = 200, description = "Daily aggregates, possibly empty", body = Vec<DayAggregate>),
        (status = 404, description = "Polygon not found", body = ApiError)
    )
)]
pub async fn get_polygon_solar(Path(id): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.polygon(&id) {
        return e.into_response();
    }
    Json(state.solar_records(&id)).into_response()
}

/// POST /api/solar/sweep
/// Simulate every polygon that has no solar data yet
///
/// Polygons are processed one after another; a failing polygon is reported
/// in `failed` and does not stop the rest. Only one sweep runs at a time: a
/// request made while one is running is answered with 202 and handled by
/// an extra pass of the running sweep.
#[utoipa::path(
    post,
    path = "/api/solar/sweep",
    responses(
        (status = 200, description = "Sweep outcome", body = SweepSummary),
        (status = 202, description = "A sweep is already running and will make another pass", body = SweepSummary)
    )
)]
pub async fn run_sweep(
    State(state): State<AppState>,
    State(pipeline): State<Arc<SolarPipeline>>,
) -> impl IntoResponse {
    match tokio::task::spawn_blocking(move || state.sweep_exclusive(&pipeline)).await {
        Ok(Some(summary)) => Json(summary).into_response(),
        Ok(None) => (StatusCode::ACCEPTED, Json(SweepSummary::default())).into_response(),
        Err(e) => {
            error!(error = %e, "sweep task panicked");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "sweep task failed")
        }
    }
}

/// GET /api/system/config
/// Effective simulation configuration
#[utoipa::path(
    get,
    path = "/api/system/config",
    responses(
        (status = 200, description = "Configuration in use", body = SystemConfig)
    )
)]
pub async fn get_system_config(
    State(config): State<Config>,
    State(pipeline): State<Arc<SolarPipeline>>,
) -> impl IntoResponse {
    Json(SystemConfig {
        api_port: config.server.port,
        version: env!("CARGO_PKG_VERSION").to_string(),
        weather: config.weather.clone(),
        simulation: pipeline.config().clone(),
        module: *pipeline.module(),
        inverter: *pipeline.inverter(),
    })
    .into_response()
}
