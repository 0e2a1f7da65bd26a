use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use axum::extract::FromRef;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, SolarError};
use crate::models::polygon::{NewPolygon, Polygon};
use crate::models::records::DayAggregate;
use crate::services::pipeline::{PolygonSource, RecordSink, SolarPipeline, SweepSummary};

/// In-memory polygon and solar-record store.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    /// Map of polygon id to polygon
    pub polygons: Arc<RwLock<HashMap<String, Polygon>>>,
    /// Map of polygon id to its day records
    pub solar: Arc<RwLock<HashMap<String, Vec<DayAggregate>>>>,
    /// Set while a sweep is running
    pub sweeping: Arc<AtomicBool>,
    /// Set when a sweep was requested while another was running
    pub sweep_requested: Arc<AtomicBool>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of polygons; entries failing validation are skipped.
    pub fn from_seed_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let seeds: Vec<NewPolygon> = serde_json::from_str(&content)?;
        let state = Self::new();
        for seed in seeds {
            match seed.validate() {
                Ok(()) => {
                    state.insert_polygon(seed.into_polygon())?;
                }
                Err(e) => warn!(path, error = %e, "skipping seed polygon"),
            }
        }
        info!(path, polygons = state.list_polygons().len(), "polygon store seeded");
        Ok(state)
    }

    pub fn insert_polygon(&self, polygon: Polygon) -> Result<Polygon> {
        let mut map = self.polygons.write().map_err(|_| poisoned())?;
        map.insert(polygon.id.clone(), polygon.clone());
        Ok(polygon)
    }

    pub fn get_polygon(&self, id: &str) -> Option<Polygon> {
        if let Ok(map) = self.polygons.read() {
            map.get(id).cloned()
        } else {
            None
        }
    }

    /// Oldest first.
    pub fn list_polygons(&self) -> Vec<Polygon> {
        let mut all: Vec<Polygon> = if let Ok(map) = self.polygons.read() {
            map.values().cloned().collect()
        } else {
            Vec::new()
        };
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Removes the polygon together with its solar records.
    pub fn delete_polygon(&self, id: &str) -> bool {
        let removed = match self.polygons.write() {
            Ok(mut map) => map.remove(id).is_some(),
            Err(_) => false,
        };
        if let Ok(mut solar) = self.solar.write() {
            solar.remove(id);
        }
        removed
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeping.load(Ordering::SeqCst)
    }

    /// Runs the batch sweep unless one is already running on this store.
    ///
    /// A request arriving during a sweep is folded into it: the running sweep
    /// makes another pass before finishing, and this call returns `None`.
    pub fn sweep_exclusive(&self, pipeline: &SolarPipeline) -> Option<SweepSummary> {
        let mut summary: Option<SweepSummary> = None;
        loop {
            if self.sweeping.swap(true, Ordering::SeqCst) {
                self.sweep_requested.store(true, Ordering::SeqCst);
                return summary;
            }
            let total = summary.get_or_insert_with(SweepSummary::default);
            loop {
                self.sweep_requested.store(false, Ordering::SeqCst);
                let pass = pipeline.sweep(self, self);
                total.processed.extend(pass.processed);
                total.failed.extend(pass.failed);
                if !self.sweep_requested.load(Ordering::SeqCst) {
                    break;
                }
                info!("sweep requested while running, making another pass");
            }
            self.sweeping.store(false, Ordering::SeqCst);
            // A request may have landed between the last pass and the release
            if !self.sweep_requested.load(Ordering::SeqCst) {
                return summary;
            }
        }
    }

    pub fn solar_records(&self, id: &str) -> Vec<DayAggregate> {
        if let Ok(map) = self.solar.read() {
            map.get(id).cloned().unwrap_or_default()
        } else {
            Vec::new()
        }
    }
}

fn poisoned() -> SolarError {
    SolarError::Store("lock poisoned".to_string())
}

impl PolygonSource for AppState {
    fn polygon(&self, id: &str) -> Result<Polygon> {
        let map = self.polygons.read().map_err(|_| poisoned())?;
        map.get(id).cloned().ok_or_else(|| SolarError::PolygonNotFound(id.to_string()))
    }

    fn polygons_without_solar(&self) -> Vec<String> {
        // Locks are taken polygons first, then solar, never the other way round
        let polygons = self.list_polygons();
        let solar = match self.solar.read() {
            Ok(map) => map,
            Err(_) => return Vec::new(),
        };
        polygons
            .into_iter()
            .filter(|p| solar.get(&p.id).is_none_or(|rows| rows.is_empty()))
            .map(|p| p.id)
            .collect()
    }
}

impl RecordSink for AppState {
    /// Rows replace whatever the polygon had before, so re-runs do not duplicate days.
    /// Rows for a polygon deleted in the meantime are refused as a whole.
    fn insert_day_records(&self, records: &[DayAggregate]) -> Result<()> {
        // Held across the write so a concurrent delete waits for it, then clears both
        let polygons = self.polygons.read().map_err(|_| poisoned())?;
        if let Some(r) = records.iter().find(|r| !polygons.contains_key(&r.polygons_id)) {
            return Err(SolarError::PolygonNotFound(r.polygons_id.clone()));
        }
        let mut map = self.solar.write().map_err(|_| poisoned())?;
        let mut by_polygon: HashMap<&str, Vec<DayAggregate>> = HashMap::new();
        for r in records {
            by_polygon.entry(r.polygons_id.as_str()).or_default().push(r.clone());
        }
        for (id, rows) in by_polygon {
            map.insert(id.to_string(), rows);
        }
        Ok(())
    }
}

/// Router state; handlers pull the part they need through `FromRef`.
#[derive(Clone)]
pub struct SharedState {
    pub app: AppState,
    pub config: Config,
    pub pipeline: Arc<SolarPipeline>,
}

impl FromRef<SharedState> for AppState {
    fn from_ref(s: &SharedState) -> Self {
        s.app.clone()
    }
}

impl FromRef<SharedState> for Config {
    fn from_ref(s: &SharedState) -> Self {
        s.config.clone()
    }
}

impl FromRef<SharedState> for Arc<SolarPipeline> {
    fn from_ref(s: &SharedState) -> Self {
        s.pipeline.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::models::records::{AggregateValues, HourlyWeatherRecord};
    use crate::services::weather::{StaticWeather, TmySample, WeatherSource};
    use chrono::{TimeDelta, Utc};
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::Mutex;

    fn clear_day() -> StaticWeather {
        StaticWeather::constant(TmySample { ghi: 500.0, dhi: 100.0, dni: 600.0, temp_air: 20.0 }, 24)
    }

    /// Deletes a polygon from the store while its weather is being fetched.
    struct DeletingWeather {
        state: AppState,
        victim: String,
    }

    impl WeatherSource for DeletingWeather {
        fn fetch_typical_year(&self, lat: f64, lon: f64, year: i32) -> Result<Vec<HourlyWeatherRecord>> {
            self.state.delete_polygon(&self.victim);
            clear_day().fetch_typical_year(lat, lon, year)
        }
    }

    /// Holds the first fetch until released; later fetches pass straight through.
    struct GatedWeather {
        entered: Mutex<Option<Sender<()>>>,
        release: Mutex<Option<Receiver<()>>>,
    }

    impl WeatherSource for GatedWeather {
        fn fetch_typical_year(&self, lat: f64, lon: f64, year: i32) -> Result<Vec<HourlyWeatherRecord>> {
            if let Some(entered) = self.entered.lock().unwrap().take() {
                entered.send(()).unwrap();
                let release = self.release.lock().unwrap().take().unwrap();
                release.recv().unwrap();
            }
            clear_day().fetch_typical_year(lat, lon, year)
        }
    }

    fn polygon(id: &str, age_s: i64) -> Polygon {
        Polygon {
            id: id.to_string(),
            name: None,
            coordinates: vec![[0.0, 0.0], [0.001, 0.0], [0.0, 0.001]],
            properties: HashMap::new(),
            created_at: Utc::now() - TimeDelta::seconds(age_s),
        }
    }

    fn day(polygon_id: &str, date: &str) -> DayAggregate {
        DayAggregate {
            date_day: date.to_string(),
            geometry: "POLYGON ((0 0, 0.001 0, 0 0.001, 0 0))".to_string(),
            values: AggregateValues::default(),
            polygons_id: polygon_id.to_string(),
        }
    }

    #[test]
    fn test_polygon_crud() {
        let state = AppState::new();
        state.insert_polygon(polygon("b", 10)).unwrap();
        state.insert_polygon(polygon("a", 20)).unwrap();

        let ids: Vec<String> = state.list_polygons().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a", "b"], "list is ordered by creation time");
        assert!(state.get_polygon("a").is_some());
        assert!(matches!(state.polygon("zzz"), Err(SolarError::PolygonNotFound(_))));

        assert!(state.delete_polygon("a"));
        assert!(!state.delete_polygon("a"));
        assert!(state.get_polygon("a").is_none());
    }

    #[test]
    fn test_polygons_without_solar() {
        let state = AppState::new();
        state.insert_polygon(polygon("a", 20)).unwrap();
        state.insert_polygon(polygon("b", 10)).unwrap();
        assert_eq!(state.polygons_without_solar(), vec!["a", "b"]);

        state.insert_day_records(&[day("a", "2023-01-01"), day("a", "2023-01-02")]).unwrap();
        assert_eq!(state.polygons_without_solar(), vec!["b"]);
        assert_eq!(state.solar_records("a").len(), 2);
    }

    #[test]
    fn test_reinsert_replaces_rows() {
        let state = AppState::new();
        state.insert_polygon(polygon("a", 10)).unwrap();
        state.insert_day_records(&[day("a", "2023-01-01"), day("a", "2023-01-02")]).unwrap();
        state.insert_day_records(&[day("a", "2023-01-01")]).unwrap();
        assert_eq!(state.solar_records("a").len(), 1);

        state.delete_polygon("a");
        assert!(state.solar_records("a").is_empty());
    }

    #[test]
    fn test_seed_file_skips_invalid_entries() {
        let path = std::env::temp_dir().join(format!("seed-{}.json", uuid::Uuid::new_v4()));
        let seed = r#"[
            {"name": "roof", "coordinates": [[-75.5782, 6.2783], [-75.5770, 6.2790], [-75.5760, 6.2780]]},
            {"coordinates": [[0.0, 0.0], [1.0, 1.0]]}
        ]"#;
        std::fs::write(&path, seed).unwrap();
        let state = AppState::from_seed_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        let all = state.list_polygons();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name.as_deref(), Some("roof"));
    }

    #[test]
    fn test_missing_seed_file_is_an_error() {
        assert!(matches!(AppState::from_seed_file("/nonexistent/seed.json"), Err(SolarError::Io(_))));
    }

    #[test]
    fn test_rows_for_unknown_polygon_are_refused() {
        let state = AppState::new();
        state.insert_polygon(polygon("a", 10)).unwrap();
        let err = state.insert_day_records(&[day("a", "2023-01-01"), day("gone", "2023-01-01")]).unwrap_err();
        assert!(matches!(err, SolarError::PolygonNotFound(ref id) if id == "gone"), "{:?}", err);
        assert!(state.solar.read().unwrap().is_empty(), "nothing is written when any row is refused");
    }

    #[test]
    fn test_delete_during_run_leaves_no_rows() {
        let state = AppState::new();
        state.insert_polygon(polygon("p1", 10)).unwrap();
        let weather = DeletingWeather { state: state.clone(), victim: "p1".to_string() };
        let pipeline = SolarPipeline::new(Arc::new(weather), SimulationConfig::default()).unwrap();

        let err = pipeline.run_for_polygon(&state, &state, "p1").unwrap_err();
        assert!(matches!(err, SolarError::PolygonNotFound(_)), "{:?}", err);
        assert!(state.get_polygon("p1").is_none());
        assert!(state.solar.read().unwrap().is_empty(), "deleted polygon must not get rows back");
    }

    #[test]
    fn test_sweep_requested_while_running_is_folded_in() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let weather = GatedWeather {
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(Some(release_rx)),
        };
        let pipeline = Arc::new(SolarPipeline::new(Arc::new(weather), SimulationConfig::default()).unwrap());
        let state = AppState::new();
        state.insert_polygon(polygon("p1", 20)).unwrap();

        let (bg_state, bg_pipeline) = (state.clone(), pipeline.clone());
        let first = std::thread::spawn(move || bg_state.sweep_exclusive(&bg_pipeline));

        // First sweep is now blocked fetching weather for p1
        entered_rx.recv().unwrap();
        assert!(state.is_sweeping());
        state.insert_polygon(polygon("p2", 10)).unwrap();
        assert!(state.sweep_exclusive(&pipeline).is_none(), "second sweep must not start");

        release_tx.send(()).unwrap();
        let summary = first.join().unwrap().unwrap();
        assert_eq!(summary.processed, vec!["p1", "p2"], "p2 is picked up by an extra pass");
        assert!(summary.failed.is_empty());
        assert!(!state.is_sweeping());
        assert!(state.polygons_without_solar().is_empty());
    }
}
