/// Plane-of-array irradiance, incidence-angle losses and cell temperature.
///
/// Transposition uses Hay-Davies for the sky diffuse part and an isotropic
/// ground reflection with a fixed albedo. NaN inputs (night) stay NaN.

use chrono::{DateTime, Datelike, Utc};
use std::f64::consts::PI;

/// Solar constant used with the Spencer eccentricity correction (W/m²)
const SOLAR_CONSTANT: f64 = 1366.1;
/// ASHRAE incidence angle modifier coefficient
const ASHRAE_B: f64 = 0.05;
/// Smallest cos(zenith) used for the beam projection ratio
const MIN_COS_ZENITH: f64 = 0.01745;

// PVsyst free-standing (open rack) thermal model
const PVSYST_U_C: f64 = 29.0;
const PVSYST_U_V: f64 = 0.0;
const PVSYST_WIND_SPEED: f64 = 1.0;
const PVSYST_MODULE_EFFICIENCY: f64 = 0.1;
const PVSYST_ALPHA_ABSORPTION: f64 = 0.9;

/// Like `f64::max`, but NaN wins.
#[inline]
fn nan_max(x: f64, floor: f64) -> f64 {
    if x.is_nan() { x } else { x.max(floor) }
}

#[inline]
fn sind(d: f64) -> f64 { d.to_radians().sin() }

#[inline]
fn cosd(d: f64) -> f64 { d.to_radians().cos() }

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoaIrradiance {
    pub poa_direct: f64,
    pub poa_diffuse: f64,
    pub poa_global: f64,
    pub iam: f64,
    /// Beam discounted by the IAM, plus undiscounted diffuse
    pub effective_irradiance: f64,
}

/// Extraterrestrial normal irradiance (Spencer 1971).
pub fn extra_radiation(timestamp: DateTime<Utc>) -> f64 {
    let b = 2.0 * PI / 365.0 * (timestamp.ordinal() as f64 - 1.0);
    let r_over_r0_sq = 1.00011
        + 0.034221 * b.cos()
        + 0.00128 * b.sin()
        + 0.000719 * (2.0 * b).cos()
        + 0.000077 * (2.0 * b).sin();
    SOLAR_CONSTANT * r_over_r0_sq
}

/// Cosine of the angle between the sun ray and the surface normal.
pub fn aoi_projection(surface_tilt: f64, surface_azimuth: f64, solar_zenith: f64, solar_azimuth: f64) -> f64 {
    let projection = cosd(solar_zenith) * cosd(surface_tilt)
        + sind(solar_zenith) * sind(surface_tilt) * cosd(solar_azimuth - surface_azimuth);
    projection.clamp(-1.0, 1.0)
}

/// Angle of incidence (deg).
pub fn aoi(surface_tilt: f64, surface_azimuth: f64, solar_zenith: f64, solar_azimuth: f64) -> f64 {
    aoi_projection(surface_tilt, surface_azimuth, solar_zenith, solar_azimuth)
        .acos()
        .to_degrees()
}

/// Hay-Davies sky diffuse on the tilted plane: isotropic part weighted by
/// (1 − anisotropy index) plus a circumsolar part projected like beam.
pub fn hay_davies(
    surface_tilt: f64,
    surface_azimuth: f64,
    dhi: f64,
    dni: f64,
    dni_extra: f64,
    solar_zenith: f64,
    solar_azimuth: f64,
) -> f64 {
    let cos_tt = nan_max(aoi_projection(surface_tilt, surface_azimuth, solar_zenith, solar_azimuth), 0.0);
    let rb = cos_tt / cosd(solar_zenith).max(MIN_COS_ZENITH);

    let anisotropy = dni / dni_extra;
    let term1 = 1.0 - anisotropy;
    let term2 = 0.5 * (1.0 + cosd(surface_tilt));

    let isotropic = nan_max(dhi * term1 * term2, 0.0);
    let circumsolar = nan_max(dhi * anisotropy * rb, 0.0);
    isotropic + circumsolar
}

/// Ground-reflected diffuse seen by the tilted plane.
pub fn ground_diffuse(surface_tilt: f64, ghi: f64, albedo: f64) -> f64 {
    ghi * albedo * (1.0 - cosd(surface_tilt)) * 0.5
}

/// ASHRAE incidence angle modifier; zero at and beyond 90°.
pub fn iam_ashrae(aoi: f64) -> f64 {
    if aoi.is_nan() {
        return f64::NAN;
    }
    if aoi.abs() >= 90.0 {
        return 0.0;
    }
    (1.0 - ASHRAE_B * (1.0 / cosd(aoi) - 1.0)).max(0.0)
}

/// PVsyst cell temperature (°C) for an open-rack mount.
pub fn pvsyst_cell(poa_global: f64, temp_air: f64) -> f64 {
    let total_loss_factor = PVSYST_U_C + PVSYST_U_V * PVSYST_WIND_SPEED;
    let heat_input = poa_global * PVSYST_ALPHA_ABSORPTION * (1.0 - PVSYST_MODULE_EFFICIENCY);
    temp_air + heat_input / total_loss_factor
}

/// Resolves horizontal irradiance onto the tracker plane for one hour.
#[allow(clippy::too_many_arguments)]
pub fn transpose(
    ghi: f64,
    dhi: f64,
    dni: f64,
    dni_extra: f64,
    surface_tilt: f64,
    surface_azimuth: f64,
    solar_zenith: f64,
    solar_azimuth: f64,
    aoi: f64,
    albedo: f64,
) -> PoaIrradiance {
    let sky = hay_davies(surface_tilt, surface_azimuth, dhi, dni, dni_extra, solar_zenith, solar_azimuth);
    let ground = ground_diffuse(surface_tilt, ghi, albedo);

    let poa_direct = nan_max(dni * cosd(aoi), 0.0);
    let poa_diffuse = sky + ground;
    let iam = iam_ashrae(aoi);

    PoaIrradiance {
        poa_direct,
        poa_diffuse,
        poa_global: poa_direct + poa_diffuse,
        iam,
        effective_irradiance: poa_direct * iam + poa_diffuse,
    }
}
