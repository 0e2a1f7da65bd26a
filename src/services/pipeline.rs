/// Polygon → hourly simulation → day/month/year aggregates.
///
/// Every run re-derives geometry and re-fetches weather; nothing is cached
/// between polygons or between runs on the same polygon.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::config::SimulationConfig;
use crate::error::{Result, SolarError};
use crate::models::polygon::Polygon;
use crate::models::records::{Aggregates, DayAggregate, HourlySimulationRecord, HourlyWeatherRecord};
use crate::services::aggregation::EnergyAggregator;
use crate::services::catalog::{self, CecModule, Inverter};
use crate::services::electrical::{calcparams_cec, max_power_points};
use crate::services::geometry::{self, GeometrySummary};
use crate::services::irradiance::{extra_radiation, pvsyst_cell, transpose};
use crate::services::solar_position;
use crate::services::weather::WeatherSource;

/// Where polygons are read from.
pub trait PolygonSource: Send + Sync {
    fn polygon(&self, id: &str) -> Result<Polygon>;
    /// Ids of polygons that have no day records yet
    fn polygons_without_solar(&self) -> Vec<String>;
}

/// Where day aggregates are written to.
pub trait RecordSink: Send + Sync {
    fn insert_day_records(&self, records: &[DayAggregate]) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SimulationReport {
    pub polygon_id: String,
    pub area_m2: f64,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    pub hours: usize,
    /// Hours whose maximum power point did not converge (reported as missing)
    pub unconverged_hours: Vec<DateTime<Utc>>,
    pub aggregates: Aggregates,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SweepFailure {
    pub polygon_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SweepSummary {
    pub processed: Vec<String>,
    pub failed: Vec<SweepFailure>,
}

/// Hourly output for one sample point.
#[derive(Debug, Clone)]
pub struct SimulatedHours {
    pub hours: Vec<HourlySimulationRecord>,
    pub unconverged: Vec<DateTime<Utc>>,
}

/// Rejects duplicate or out-of-order hours, which would otherwise be
/// silently folded into the wrong aggregates.
pub fn validate_series(weather: &[HourlyWeatherRecord]) -> Result<()> {
    for (i, pair) in weather.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(SolarError::MalformedSeries(format!(
                "timestamp {} at index {} does not follow {}",
                pair[1].timestamp,
                i + 1,
                pair[0].timestamp
            )));
        }
    }
    Ok(())
}

pub struct SolarPipeline {
    weather: Arc<dyn WeatherSource>,
    config: SimulationConfig,
    module: CecModule,
    inverter: Inverter,
    aggregator: EnergyAggregator,
}

impl SolarPipeline {
    pub fn new(weather: Arc<dyn WeatherSource>, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let module = catalog::module_by_id(&config.module)
            .ok_or_else(|| SolarError::Config(format!("unknown module '{}'", config.module)))?;
        let inverter = catalog::inverter_by_id(&config.inverter)
            .ok_or_else(|| SolarError::Config(format!("unknown inverter '{}'", config.inverter)))?;
        info!(
            module = module.name,
            inverter = inverter.name,
            inverter_paco_w = inverter.paco,
            year = config.year,
            "solar pipeline ready"
        );
        let aggregator = EnergyAggregator::new(config.packing_density, config.module_efficiency);
        Ok(Self { weather, config, module, inverter, aggregator })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn module(&self) -> &CecModule {
        &self.module
    }

    pub fn inverter(&self) -> &Inverter {
        &self.inverter
    }

    /// Runs every per-hour stage on an already fetched weather series.
    pub fn simulate_hours(
        &self,
        weather: &[HourlyWeatherRecord],
        lat: f64,
        lon: f64,
        wkt: &str,
    ) -> Result<SimulatedHours> {
        validate_series(weather)?;
        let geometry = solar_position::compute(weather, lat, lon, &self.config.tracker)?;

        let mut partial = Vec::with_capacity(weather.len());
        let mut diode = Vec::with_capacity(weather.len());
        for (w, g) in weather.iter().zip(&geometry) {
            let dni_extra = extra_radiation(w.timestamp);
            let poa = transpose(
                w.ghi,
                w.dhi,
                w.dni,
                dni_extra,
                g.surface_tilt,
                g.surface_azimuth,
                g.solar_zenith,
                g.solar_azimuth,
                g.aoi,
                self.config.albedo,
            );
            let temp_cell = pvsyst_cell(poa.poa_global, w.temp_air);
            diode.push(calcparams_cec(poa.effective_irradiance, temp_cell, &self.module));
            partial.push((dni_extra, poa, temp_cell));
        }

        let batch = max_power_points(&diode, &self.config.solver);

        let hours = weather
            .iter()
            .zip(&geometry)
            .zip(partial)
            .zip(&batch.points)
            .map(|(((w, g), (dni_extra, poa, temp_cell)), mpp)| HourlySimulationRecord {
                timestamp: w.timestamp,
                ghi: w.ghi,
                dhi: w.dhi,
                dni: w.dni,
                temp_air: w.temp_air,
                solar_zenith: g.solar_zenith,
                solar_azimuth: g.solar_azimuth,
                surface_tilt: g.surface_tilt,
                surface_azimuth: g.surface_azimuth,
                aoi: g.aoi,
                dni_extra,
                poa_direct: poa.poa_direct,
                poa_diffuse: poa.poa_diffuse,
                poa_global: poa.poa_global,
                iam: poa.iam,
                effective_irradiance: poa.effective_irradiance,
                temp_cell,
                i_mp: mpp.i_mp,
                v_mp: mpp.v_mp,
                p_mp: mpp.p_mp,
                latitude: lat,
                longitude: lon,
                area_panel: f64::NAN,
                energy_kwh: f64::NAN,
                energy_mwh: f64::NAN,
                geometry: wkt.to_string(),
            })
            .collect();

        let unconverged: Vec<DateTime<Utc>> = batch.unconverged.iter().map(|&k| weather[k].timestamp).collect();
        if !unconverged.is_empty() {
            warn!(
                lat,
                lon,
                count = unconverged.len(),
                first = %unconverged[0],
                "max power point did not converge, hours reported as missing"
            );
        }
        Ok(SimulatedHours { hours, unconverged })
    }

    /// Full pipeline for one polygon ring; nothing is persisted.
    pub fn run(&self, polygon_id: &str, ring: &[[f64; 2]]) -> Result<SimulationReport> {
        let started = Instant::now();
        let summary: GeometrySummary = geometry::summarize(ring)?;
        info!(
            polygon_id,
            area_m2 = summary.area_m2,
            lat = summary.centroid_lat,
            lon = summary.centroid_lon,
            "polygon summarized"
        );

        let mut hourly: Vec<HourlySimulationRecord> = Vec::new();
        let mut unconverged = Vec::new();
        for (lat, lon) in summary.sample_points() {
            let weather = self.weather.fetch_typical_year(lat, lon, self.config.year)?;
            let point = self.simulate_hours(&weather, lat, lon, &summary.wkt)?;
            hourly.extend(point.hours);
            unconverged.extend(point.unconverged);
        }

        let aggregates = self.aggregator.aggregate(&mut hourly, polygon_id, summary.area_m2);
        info!(
            polygon_id,
            hours = hourly.len(),
            days = aggregates.days.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "simulation finished"
        );

        Ok(SimulationReport {
            polygon_id: polygon_id.to_string(),
            area_m2: summary.area_m2,
            centroid_lat: summary.centroid_lat,
            centroid_lon: summary.centroid_lon,
            hours: hourly.len(),
            unconverged_hours: unconverged,
            aggregates,
        })
    }

    /// Looks the polygon up, runs it and hands the day rows to the sink.
    pub fn run_for_polygon(
        &self,
        source: &dyn PolygonSource,
        sink: &dyn RecordSink,
        polygon_id: &str,
    ) -> Result<SimulationReport> {
        let polygon = source.polygon(polygon_id)?;
        let report = self.run(&polygon.id, &polygon.coordinates)?;
        sink.insert_day_records(&report.aggregates.days)?;
        info!(polygon_id, rows = report.aggregates.days.len(), "day records stored");
        Ok(report)
    }

    /// Processes every polygon lacking solar data, one after another.
    /// A failing polygon is recorded and skipped.
    pub fn sweep(&self, source: &dyn PolygonSource, sink: &dyn RecordSink) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for id in source.polygons_without_solar() {
            match self.run_for_polygon(source, sink, &id) {
                Ok(_) => summary.processed.push(id),
                Err(e) => {
                    error!(polygon_id = %id, error = %e, "solar run failed");
                    summary.failed.push(SweepFailure { polygon_id: id, error: e.to_string() });
                }
            }
        }
        info!(processed = summary.processed.len(), failed = summary.failed.len(), "sweep finished");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use crate::services::weather::{StaticWeather, TmySample};
    use chrono::{TimeDelta, TimeZone};
    use std::collections::HashMap;
    use std::sync::Mutex;

    const RING: [[f64; 2]; 3] = [[-75.5782, 6.2783], [-75.5770, 6.2790], [-75.5760, 6.2780]];

    fn constant_day() -> Arc<dyn WeatherSource> {
        Arc::new(StaticWeather::constant(
            TmySample { ghi: 500.0, dhi: 100.0, dni: 600.0, temp_air: 20.0 },
            24,
        ))
    }

    fn pipeline(weather: Arc<dyn WeatherSource>) -> SolarPipeline {
        SolarPipeline::new(weather, SimulationConfig::default()).unwrap()
    }

    struct Unreachable;

    impl WeatherSource for Unreachable {
        fn fetch_typical_year(&self, lat: f64, lon: f64, _year: i32) -> Result<Vec<HourlyWeatherRecord>> {
            Err(SolarError::WeatherUnavailable(format!("no coverage at ({}, {})", lat, lon)))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        polygons: HashMap<String, Polygon>,
        rows: Mutex<Vec<DayAggregate>>,
    }

    impl MemoryStore {
        fn with(polygons: Vec<(&str, Vec<[f64; 2]>)>) -> Self {
            let polygons = polygons
                .into_iter()
                .map(|(id, coordinates)| {
                    let p = Polygon {
                        id: id.to_string(),
                        name: None,
                        coordinates,
                        properties: HashMap::new(),
                        created_at: Utc::now(),
                    };
                    (id.to_string(), p)
                })
                .collect();
            Self { polygons, rows: Mutex::new(Vec::new()) }
        }
    }

    impl PolygonSource for MemoryStore {
        fn polygon(&self, id: &str) -> Result<Polygon> {
            self.polygons.get(id).cloned().ok_or_else(|| SolarError::PolygonNotFound(id.to_string()))
        }

        fn polygons_without_solar(&self) -> Vec<String> {
            let mut ids: Vec<String> = self.polygons.keys().cloned().collect();
            ids.sort();
            ids
        }
    }

    impl RecordSink for MemoryStore {
        fn insert_day_records(&self, records: &[DayAggregate]) -> Result<()> {
            self.rows.lock().unwrap().extend_from_slice(records);
            Ok(())
        }
    }

    fn same(a: f64, b: f64) -> bool {
        a.to_bits() == b.to_bits()
    }

    #[test]
    fn test_constant_day_is_deterministic() {
        let p = pipeline(constant_day());
        let first = p.run("poly-1", &RING).unwrap();
        let second = p.run("poly-1", &RING).unwrap();

        assert_eq!(first.hours, 24);
        assert_eq!(first.aggregates.days.len(), 1);
        let (a, b) = (&first.aggregates.days[0].values, &second.aggregates.days[0].values);
        assert!(same(a.p_mp, b.p_mp) && same(a.energy_kwh, b.energy_kwh) && same(a.temp_cell, b.temp_cell));
        assert!(a.energy_kwh > 0.0, "daylight hours must produce energy");
        assert_eq!(a.energy_mwh, a.energy_kwh / 1000.0);
        assert!(first.unconverged_hours.is_empty());
    }

    #[test]
    fn test_hourly_records_carry_site_and_energy() {
        let p = pipeline(constant_day());
        let weather = StaticWeather::constant(TmySample { ghi: 500.0, dhi: 100.0, dni: 600.0, temp_air: 20.0 }, 24)
            .fetch_typical_year(6.28, -75.58, 2023)
            .unwrap();
        let mut sim = p.simulate_hours(&weather, 6.28, -75.58, "POLYGON ((0 0, 1 0, 0 1, 0 0))").unwrap();
        p.aggregator.assign_energy(&mut sim.hours, 1000.0);

        assert_eq!(sim.hours.len(), 24);
        // Medellín is UTC-5: 17 UTC is around local noon, 5 UTC is night
        let noon = &sim.hours[17];
        let night = &sim.hours[5];
        assert!(noon.p_mp > 100.0, "noon power {:.1}", noon.p_mp);
        assert!(noon.poa_global > 0.0 && noon.iam > 0.9);
        assert!(night.surface_tilt.is_nan() && night.p_mp.is_nan());
        for h in &sim.hours {
            assert_eq!(h.latitude, 6.28);
            assert_eq!(h.area_panel, 1000.0);
            assert!(same(h.energy_mwh, h.energy_kwh / 1000.0));
            assert!(h.energy_kwh.is_nan() || h.energy_kwh >= 0.0);
        }
    }

    #[test]
    fn test_invalid_geometry_stops_before_weather() {
        let store = MemoryStore::with(vec![("bad", vec![[0.0, 0.0], [1.0, 1.0]])]);
        let p = pipeline(Arc::new(Unreachable));
        let err = p.run_for_polygon(&store, &store, "bad").unwrap_err();
        assert!(matches!(err, SolarError::InvalidGeometry(_)), "{:?}", err);
        assert!(store.rows.lock().unwrap().is_empty());
    }

    #[test]
    fn test_weather_unavailable_is_surfaced() {
        let p = pipeline(Arc::new(Unreachable));
        let err = p.run("poly-1", &RING).unwrap_err();
        assert!(matches!(err, SolarError::WeatherUnavailable(_)));
    }

    #[test]
    fn test_malformed_timestamps_rejected() {
        let p = pipeline(constant_day());
        let mut weather = StaticWeather::constant(TmySample { ghi: 0.0, dhi: 0.0, dni: 0.0, temp_air: 10.0 }, 4)
            .fetch_typical_year(0.0, 0.0, 2023)
            .unwrap();
        weather[2].timestamp = weather[1].timestamp;
        let err = p.simulate_hours(&weather, 0.0, 0.0, "g").unwrap_err();
        assert!(matches!(err, SolarError::MalformedSeries(_)));

        weather[2].timestamp = weather[0].timestamp - TimeDelta::hours(1);
        assert!(matches!(validate_series(&weather), Err(SolarError::MalformedSeries(_))));
    }

    #[test]
    fn test_non_convergence_does_not_abort() {
        let config = SimulationConfig { solver: SolverConfig { max_iter: 1, tol: 1e-300 }, ..SimulationConfig::default() };
        let p = SolarPipeline::new(constant_day(), config).unwrap();
        let report = p.run("poly-1", &RING).unwrap();
        assert!(!report.unconverged_hours.is_empty());
        assert_eq!(report.hours, 24);
        let day = &report.aggregates.days[0].values;
        // Every sunlit hour is a gap, so nothing is summed
        assert_eq!(day.p_mp, 0.0);
        assert_eq!(report.unconverged_hours[0].date_naive(), Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap().date_naive());
    }

    #[test]
    fn test_sweep_continues_after_failure() {
        let store = MemoryStore::with(vec![
            ("a-bad", vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]),
            ("b-good", RING.to_vec()),
        ]);
        let p = pipeline(constant_day());
        let summary = p.sweep(&store, &store);
        assert_eq!(summary.processed, vec!["b-good".to_string()]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].polygon_id, "a-bad");
        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].polygons_id, "b-good");
        assert_eq!(rows[0].date_day, "2023-01-01");
    }
}
