use axum::{routing::{get, post}, Router};
use crate::controllers::polygon_controller::{
    list_polygons, create_polygon, get_polygon, delete_polygon,
};
use crate::controllers::solar_controller::{
    run_polygon_solar, get_polygon_solar, run_sweep, get_system_config,
};
use crate::shared_state::SharedState;

/// Build the `/api/*` sub-router.
/// Handlers extract `State<AppState>`, `State<Config>` and the pipeline via
/// `FromRef<SharedState>`; a single `.with_state(shared)` covers all three.
pub fn api_routes(shared: SharedState) -> Router {
    Router::new()
        .route("/polygons",              get(list_polygons).post(create_polygon))
        .route("/polygons/{id}",         get(get_polygon).delete(delete_polygon))
        .route("/polygons/{id}/solar",   get(get_polygon_solar).post(run_polygon_solar))
        .route("/solar/sweep",           post(run_sweep))
        .route("/system/config",         get(get_system_config))
        .with_state(shared)
}
