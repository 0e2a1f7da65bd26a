use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ─── Weather input ───────────────────────────────────────────────────────────

/// One hour of the typical-year dataset, re-timestamped onto the simulation year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HourlyWeatherRecord {
    pub timestamp: DateTime<Utc>,
    /// Global horizontal irradiance (W/m²)
    pub ghi: f64,
    /// Diffuse horizontal irradiance (W/m²)
    pub dhi: f64,
    /// Direct normal irradiance (W/m²)
    pub dni: f64,
    /// Air temperature at 2 m (°C)
    pub temp_air: f64,
}

// ─── Simulation output ───────────────────────────────────────────────────────

/// Full state of one simulated hour. Missing values (night, solver gaps) are NaN.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HourlySimulationRecord {
    pub timestamp: DateTime<Utc>,
    pub ghi: f64,
    pub dhi: f64,
    pub dni: f64,
    pub temp_air: f64,

    // ── Geometry ─────────────────────────────────────────────────────────────
    /// Apparent solar zenith (deg)
    pub solar_zenith: f64,
    /// Solar azimuth, clockwise from north (deg)
    pub solar_azimuth: f64,
    pub surface_tilt: f64,
    pub surface_azimuth: f64,
    /// Angle of incidence on the tracker surface (deg)
    pub aoi: f64,

    // ── Irradiance ───────────────────────────────────────────────────────────
    /// Extraterrestrial normal irradiance (W/m²)
    pub dni_extra: f64,
    pub poa_direct: f64,
    pub poa_diffuse: f64,
    pub poa_global: f64,
    pub iam: f64,
    pub effective_irradiance: f64,
    pub temp_cell: f64,

    // ── Electrical ───────────────────────────────────────────────────────────
    pub i_mp: f64,
    pub v_mp: f64,
    pub p_mp: f64,

    // ── Site & energy ────────────────────────────────────────────────────────
    pub latitude: f64,
    pub longitude: f64,
    /// Panel area (m²)
    pub area_panel: f64,
    pub energy_kwh: f64,
    pub energy_mwh: f64,
    /// WKT of the polygon this hour belongs to
    pub geometry: String,
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

/// Reduced quantities shared by every aggregation granularity.
///
/// Means: latitude, longitude, area_panel, surface_tilt, surface_azimuth,
/// temp_air, iam, temp_cell. Everything else is a sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AggregateValues {
    pub latitude: f64,
    pub longitude: f64,
    pub area_panel: f64,
    pub surface_tilt: f64,
    pub surface_azimuth: f64,
    pub ghi: f64,
    pub dhi: f64,
    pub dni: f64,
    pub dni_extra: f64,
    pub temp_air: f64,
    pub poa_direct: f64,
    pub poa_diffuse: f64,
    pub poa_global: f64,
    pub iam: f64,
    pub effective_irradiance: f64,
    pub temp_cell: f64,
    pub i_mp: f64,
    pub v_mp: f64,
    pub p_mp: f64,
    pub energy_kwh: f64,
    pub energy_mwh: f64,
}

/// Row persisted to the solar records store, keyed by (date_day, geometry, polygons_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DayAggregate {
    /// Calendar date, `YYYY-MM-DD`
    pub date_day: String,
    pub geometry: String,
    #[serde(flatten)]
    pub values: AggregateValues,
    pub polygons_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MonthAggregate {
    /// `YYYY-MM`
    pub date: String,
    pub geometry: String,
    #[serde(flatten)]
    pub values: AggregateValues,
    /// Distinct calendar days contributing to the month
    pub dias_por_mes: u32,
    /// Mean daily horizontal irradiation (kWh/m²/day)
    pub ghi_kwh_dia: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct YearAggregate {
    /// `YYYY`
    pub date: String,
    pub geometry: String,
    #[serde(flatten)]
    pub values: AggregateValues,
    /// Yearly GHI / 365 / 1000, fixed divisor even in leap years
    pub ghi_kwh_dia: f64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct Aggregates {
    pub days: Vec<DayAggregate>,
    pub months: Vec<MonthAggregate>,
    pub years: Vec<YearAggregate>,
}
