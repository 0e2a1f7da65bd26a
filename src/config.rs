use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Result, SolarError};
use crate::services::catalog;

fn default_weather_url() -> String { "https://re.jrc.ec.europa.eu/api/v5_2/".to_string() }
fn default_weather_timeout() -> u64 { 60 }
fn default_year() -> i32 { 2023 }
fn default_albedo() -> f64 { 0.25 }
fn default_packing_density() -> f64 { 0.8 }
fn default_module_efficiency() -> f64 { 0.18 }
fn default_module() -> String { catalog::DEFAULT_MODULE.to_string() }
fn default_inverter() -> String { catalog::DEFAULT_INVERTER.to_string() }
fn default_max_angle() -> f64 { 90.0 }
fn default_gcr() -> f64 { 2.0 / 7.0 }
fn default_max_iter() -> usize { 100 }
fn default_tol() -> f64 { 1e-6 }

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// JSON array of polygons loaded into the in-memory store at start-up
    pub seed_file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_url")]
    pub base_url: String,
    #[serde(default = "default_weather_timeout")]
    pub timeout_s: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self { base_url: default_weather_url(), timeout_s: default_weather_timeout() }
    }
}

/// Constants consumed by the simulation core.
#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct SimulationConfig {
    /// Calendar year the typical-year dataset is re-timestamped onto
    #[serde(default = "default_year")]
    pub year: i32,
    /// Ground albedo for the reflected diffuse component
    #[serde(default = "default_albedo")]
    pub albedo: f64,
    /// m² of panel per m² of available ground
    #[serde(default = "default_packing_density")]
    pub packing_density: f64,
    #[serde(default = "default_module_efficiency")]
    pub module_efficiency: f64,
    #[serde(default = "default_module")]
    pub module: String,
    #[serde(default = "default_inverter")]
    pub inverter: String,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub solver: SolverConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            year: default_year(),
            albedo: default_albedo(),
            packing_density: default_packing_density(),
            module_efficiency: default_module_efficiency(),
            module: default_module(),
            inverter: default_inverter(),
            tracker: TrackerConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, ToSchema)]
pub struct TrackerConfig {
    /// Tilt of the rotation axis from horizontal (deg)
    #[serde(default)]
    pub axis_tilt: f64,
    /// Compass bearing of the rotation axis (deg, 0 = N-S axis)
    #[serde(default)]
    pub axis_azimuth: f64,
    /// Rotation limit either side of horizontal (deg)
    #[serde(default = "default_max_angle")]
    pub max_angle: f64,
    #[serde(default)]
    pub backtrack: bool,
    /// Ground coverage ratio, only used when backtracking
    #[serde(default = "default_gcr")]
    pub gcr: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            axis_tilt: 0.0,
            axis_azimuth: 0.0,
            max_angle: default_max_angle(),
            backtrack: false,
            gcr: default_gcr(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, ToSchema)]
pub struct SolverConfig {
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tol")]
    pub tol: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { max_iter: default_max_iter(), tol: default_tol() }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.simulation.validate()?;
        Ok(config)
    }
}

impl SimulationConfig {
    /// Rejects model identifiers missing from the catalog and out-of-range factors.
    pub fn validate(&self) -> Result<()> {
        if catalog::module_by_id(&self.module).is_none() {
            return Err(SolarError::Config(format!("unknown module '{}'", self.module)));
        }
        if catalog::inverter_by_id(&self.inverter).is_none() {
            return Err(SolarError::Config(format!("unknown inverter '{}'", self.inverter)));
        }
        if !(0.0..=1.0).contains(&self.albedo) {
            return Err(SolarError::Config(format!("albedo {} outside [0, 1]", self.albedo)));
        }
        if !(self.packing_density > 0.0 && self.packing_density <= 1.0) {
            return Err(SolarError::Config(format!("packing density {} outside (0, 1]", self.packing_density)));
        }
        if !(self.module_efficiency > 0.0 && self.module_efficiency <= 1.0) {
            return Err(SolarError::Config(format!("module efficiency {} outside (0, 1]", self.module_efficiency)));
        }
        if !(self.tracker.max_angle > 0.0 && self.tracker.max_angle <= 180.0) {
            return Err(SolarError::Config(format!("tracker max_angle {} outside (0, 180]", self.tracker.max_angle)));
        }
        if !(self.tracker.gcr > 0.0 && self.tracker.gcr <= 1.0) {
            return Err(SolarError::Config(format!("tracker gcr {} outside (0, 1]", self.tracker.gcr)));
        }
        if self.solver.max_iter == 0 {
            return Err(SolarError::Config("solver.max_iter must be positive".to_string()));
        }
        Ok(())
    }
}
