mod routes;
mod controllers;
mod services;
mod models;
mod api_docs;
mod shared_state;
mod config;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;
use axum::{Router, routing::get, response::Html};
use crate::routes::api_routes::api_routes;
use utoipa::OpenApi;
use utoipa_scalar::Scalar;
use crate::api_docs::ApiDoc;
use crate::shared_state::{AppState, SharedState};
use crate::config::Config;
use crate::services::pipeline::SolarPipeline;
use crate::services::weather::PvgisClient;

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "solar-yield stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = Config::load(&config_path)?;
    info!(path = %config_path, port = config.server.port, "configuration loaded");

    // 2. Initialize polygon store
    let state = match &config.store.seed_file {
        Some(path) => AppState::from_seed_file(path)?,
        None => AppState::new(),
    };

    // 3. Build the simulation pipeline. The blocking HTTP client must be
    //    created off the async runtime.
    let cfg = config.clone();
    let pipeline = tokio::task::spawn_blocking(move || -> crate::error::Result<SolarPipeline> {
        let weather = PvgisClient::new(&cfg.weather)?;
        SolarPipeline::new(Arc::new(weather), cfg.simulation)
    })
    .await??;

    let shared = SharedState {
        app: state,
        config: config.clone(),
        pipeline: Arc::new(pipeline),
    };

    // 4. Start Axum HTTP server
    let app = Router::new()
        .nest("/api", api_routes(shared))
        .route("/scalar", get(|| async {
            Html(Scalar::new(ApiDoc::openapi()).to_html())
        }))
        .fallback_service(ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("API Server listening on http://{}", addr);
    info!("Scalar UI: http://{}/scalar", addr);

    axum_server::bind(addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
