/// Sun position and single-axis tracker orientation per hour.
///
/// Sun position comes from NREL SPA (apparent, refraction-corrected).
/// Tracker rotation follows Lorenzo et al. (2011), optionally with
/// backtracking; hours with the sun below the horizon have NaN geometry.

use solar_positioning::{spa, RefractionCorrection};

use crate::config::TrackerConfig;
use crate::error::{Result, SolarError};
use crate::models::records::HourlyWeatherRecord;
use crate::services::irradiance::aoi;

/// TT − UT (s)
const DELTA_T: f64 = 67.0;
/// Standard atmosphere used for the refraction correction
const PRESSURE_HPA: f64 = 1013.25;
const AIR_TEMPERATURE_C: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerOrientation {
    /// Rotation from horizontal, clockwise positive looking along the axis (deg)
    pub tracker_theta: f64,
    pub surface_tilt: f64,
    pub surface_azimuth: f64,
    pub aoi: f64,
}

/// Sun and tracker geometry for one hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourGeometry {
    pub solar_zenith: f64,
    pub solar_azimuth: f64,
    pub surface_tilt: f64,
    pub surface_azimuth: f64,
    pub aoi: f64,
}

/// Apparent zenith and azimuth (deg) at the given instant.
pub fn sun_position(weather: &HourlyWeatherRecord, lat: f64, lon: f64) -> Result<(f64, f64)> {
    let refraction = RefractionCorrection::new(PRESSURE_HPA, AIR_TEMPERATURE_C)
        .map_err(|e| SolarError::SolarPosition(format!("{:?}", e)))?;
    let pos = spa::solar_position(weather.timestamp, lat, lon, 0.0, DELTA_T, Some(refraction))
        .map_err(|e| SolarError::SolarPosition(format!("{} at ({}, {}): {:?}", weather.timestamp, lat, lon, e)))?;
    Ok((pos.zenith_angle(), pos.azimuth()))
}

/// Orientation of a single-axis tracker following the sun.
pub fn single_axis(apparent_zenith: f64, apparent_azimuth: f64, cfg: &TrackerConfig) -> TrackerOrientation {
    let (sind, cosd) = (|d: f64| d.to_radians().sin(), |d: f64| d.to_radians().cos());

    // Sun vector, x west / y south / z up
    let az = apparent_azimuth - 180.0;
    let elevation = 90.0 - apparent_zenith;
    let x = cosd(elevation) * sind(az);
    let y = cosd(elevation) * cosd(az);
    let z = sind(elevation);

    // Into the tracker frame: y along the axis, z normal to the resting panel
    let axis_azimuth_south = cfg.axis_azimuth - 180.0;
    let xp = x * cosd(axis_azimuth_south) - y * sind(axis_azimuth_south);
    let zp = x * sind(cfg.axis_tilt) * sind(axis_azimuth_south)
        + y * sind(cfg.axis_tilt) * cosd(axis_azimuth_south)
        + z * cosd(cfg.axis_tilt);

    let mut wid = xp.atan2(zp).to_degrees();
    if apparent_zenith > 90.0 {
        wid = f64::NAN;
    }

    let theta = if cfg.backtrack {
        let axes_distance = 1.0 / cfg.gcr;
        let temp = (axes_distance * cosd(wid)).abs();
        if temp < 1.0 {
            wid - wid.signum() * temp.acos().to_degrees()
        } else {
            wid
        }
    } else {
        wid
    };
    let tracker_theta = theta.clamp(-cfg.max_angle, cfg.max_angle);

    let (surface_tilt, surface_azimuth) = surface_orientation(tracker_theta, cfg.axis_tilt, cfg.axis_azimuth);
    TrackerOrientation {
        tracker_theta,
        surface_tilt,
        surface_azimuth,
        aoi: aoi(surface_tilt, surface_azimuth, apparent_zenith, apparent_azimuth),
    }
}

/// Panel tilt and azimuth for a given rotation about the tracker axis.
fn surface_orientation(tracker_theta: f64, axis_tilt: f64, axis_azimuth: f64) -> (f64, f64) {
    let rad = f64::to_radians;
    let surface_tilt = (rad(tracker_theta).cos() * rad(axis_tilt).cos()).clamp(-1.0, 1.0).acos().to_degrees();

    let azimuth_delta = if tracker_theta.is_nan() {
        f64::NAN
    } else if rad(surface_tilt).sin() == 0.0 {
        90.0
    } else {
        let delta = (rad(tracker_theta).sin() / rad(surface_tilt).sin()).clamp(-1.0, 1.0).asin().to_degrees();
        if tracker_theta.abs() < 90.0 {
            delta
        } else {
            -delta + tracker_theta.signum() * 180.0
        }
    };
    (surface_tilt, (axis_azimuth + azimuth_delta).rem_euclid(360.0))
}

/// Sun and tracker geometry for every hour of the series.
pub fn compute(weather: &[HourlyWeatherRecord], lat: f64, lon: f64, cfg: &TrackerConfig) -> Result<Vec<HourGeometry>> {
    weather
        .iter()
        .map(|w| {
            let (zenith, azimuth) = sun_position(w, lat, lon)?;
            let tracker = single_axis(zenith, azimuth, cfg);
            Ok(HourGeometry {
                solar_zenith: zenith,
                solar_azimuth: azimuth,
                surface_tilt: tracker.surface_tilt,
                surface_azimuth: tracker.surface_azimuth,
                aoi: tracker.aoi,
            })
        })
        .collect()
}
