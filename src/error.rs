use thiserror::Error;

/// Failures that abort a pipeline run for one polygon.
///
/// Per-hour solver non-convergence is not an error: those hours come
/// back as NaN and are listed in `SimulationReport::unconverged_hours`.
#[derive(Debug, Error)]
pub enum SolarError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("weather unavailable: {0}")]
    WeatherUnavailable(String),
    #[error("malformed hourly series: {0}")]
    MalformedSeries(String),
    #[error("solar position failed: {0}")]
    SolarPosition(String),
    #[error("polygon not found: {0}")]
    PolygonNotFound(String),
    #[error("store unavailable: {0}")]
    Store(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for SolarError {
    fn from(e: reqwest::Error) -> Self {
        SolarError::WeatherUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SolarError>;
