use serde::Serialize;
use utoipa::ToSchema;

use crate::config::{SimulationConfig, WeatherConfig};
use crate::services::catalog::{CecModule, Inverter};

// ─── REST API response types ──────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemConfig {
    pub api_port: u16,
    pub version: String,
    pub weather: WeatherConfig,
    pub simulation: SimulationConfig,
    /// Resolved catalogue entry for `simulation.module`
    pub module: CecModule,
    /// Resolved catalogue entry for `simulation.inverter`; reported, not applied
    pub inverter: Inverter,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
}
