use std::time::{Duration, Instant};

use chrono::{TimeDelta, TimeZone, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::WeatherConfig;
use crate::error::{Result, SolarError};
use crate::models::records::HourlyWeatherRecord;

/// Source of typical-meteorological-year data for a location.
pub trait WeatherSource: Send + Sync {
    /// Hourly series re-timestamped onto `year`, starting Jan 1 00:00 UTC.
    fn fetch_typical_year(&self, lat: f64, lon: f64, year: i32) -> Result<Vec<HourlyWeatherRecord>>;
}

/// One untimestamped hour of a typical year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TmySample {
    pub ghi: f64,
    pub dhi: f64,
    pub dni: f64,
    pub temp_air: f64,
}

/// Re-indexes samples hour by hour from `year`-01-01 00:00 UTC.
///
/// Count and order are kept as delivered; a dataset longer than the target
/// year simply runs into the next one.
pub fn retime(samples: &[TmySample], year: i32) -> Result<Vec<HourlyWeatherRecord>> {
    let start = Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| SolarError::Config(format!("invalid simulation year {}", year)))?;

    Ok(samples
        .iter()
        .enumerate()
        .map(|(i, s)| HourlyWeatherRecord {
            timestamp: start + TimeDelta::hours(i as i64),
            ghi: s.ghi,
            dhi: s.dhi,
            dni: s.dni,
            temp_air: s.temp_air,
        })
        .collect())
}

// ─── PVGIS wire types ────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PvgisTmyResponse {
    outputs: PvgisOutputs,
}

#[derive(Debug, Deserialize)]
struct PvgisOutputs {
    tmy_hourly: Vec<PvgisHour>,
}

#[derive(Debug, Deserialize)]
struct PvgisHour {
    #[serde(rename = "T2m")]
    t2m: f64,
    #[serde(rename = "G(h)")]
    g_h: f64,
    #[serde(rename = "Gb(n)")]
    gb_n: f64,
    #[serde(rename = "Gd(h)")]
    gd_h: f64,
}

#[derive(Debug, Deserialize)]
struct PvgisErrorBody {
    message: String,
}

fn parse_tmy(body: &str) -> Result<Vec<TmySample>> {
    let resp: PvgisTmyResponse = serde_json::from_str(body)
        .map_err(|e| SolarError::WeatherUnavailable(format!("unreadable TMY payload: {}", e)))?;
    if resp.outputs.tmy_hourly.is_empty() {
        return Err(SolarError::WeatherUnavailable("empty TMY series".to_string()));
    }
    Ok(resp
        .outputs
        .tmy_hourly
        .into_iter()
        .map(|h| TmySample { ghi: h.g_h, dhi: h.gd_h, dni: h.gb_n, temp_air: h.t2m })
        .collect())
}

/// Blocking client for the PVGIS `tmy` endpoint.
pub struct PvgisClient {
    client: Client,
    base_url: String,
}

impl PvgisClient {
    pub fn new(cfg: &WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_s))
            .build()?;
        let base_url = if cfg.base_url.ends_with('/') {
            cfg.base_url.clone()
        } else {
            format!("{}/", cfg.base_url)
        };
        Ok(Self { client, base_url })
    }
}

impl WeatherSource for PvgisClient {
    fn fetch_typical_year(&self, lat: f64, lon: f64, year: i32) -> Result<Vec<HourlyWeatherRecord>> {
        let url = format!("{}tmy", self.base_url);
        let started = Instant::now();

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("outputformat", "json".to_string()),
            ])
            .send()?;

        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            let detail = serde_json::from_str::<PvgisErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or(body);
            return Err(SolarError::WeatherUnavailable(format!("PVGIS {}: {}", status, detail)));
        }

        let samples = parse_tmy(&body)?;
        info!(lat, lon, hours = samples.len(), elapsed_ms = started.elapsed().as_millis() as u64, "fetched PVGIS typical year");
        retime(&samples, year)
    }
}

/// Fixed series, for tests and offline runs.
#[derive(Debug, Clone)]
pub struct StaticWeather {
    samples: Vec<TmySample>,
}

impl StaticWeather {
    pub fn new(samples: Vec<TmySample>) -> Self {
        Self { samples }
    }

    pub fn constant(sample: TmySample, hours: usize) -> Self {
        Self { samples: vec![sample; hours] }
    }
}

impl WeatherSource for StaticWeather {
    fn fetch_typical_year(&self, lat: f64, lon: f64, year: i32) -> Result<Vec<HourlyWeatherRecord>> {
        if self.samples.is_empty() {
            return Err(SolarError::WeatherUnavailable(format!("no static series for ({}, {})", lat, lon)));
        }
        debug!(lat, lon, hours = self.samples.len(), "serving static weather");
        retime(&self.samples, year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SAMPLE_BODY: &str = r#"{
        "inputs": {"location": {"latitude": 6.278, "longitude": -75.577, "elevation": 1495.0}},
        "outputs": {
            "months_selected": [{"month": 1, "year": 2012}],
            "tmy_hourly": [
                {"time(UTC)": "20120101:0000", "T2m": 16.1, "RH": 88.0, "G(h)": 0.0, "Gb(n)": 0.0, "Gd(h)": 0.0, "IR(h)": 330.1, "WS10m": 1.2, "WD10m": 120.0, "SP": 84800.0},
                {"time(UTC)": "20120101:0100", "T2m": 15.8, "RH": 89.0, "G(h)": 0.0, "Gb(n)": 0.0, "Gd(h)": 0.0, "IR(h)": 329.0, "WS10m": 1.1, "WD10m": 118.0, "SP": 84790.0},
                {"time(UTC)": "20120101:1700", "T2m": 24.3, "RH": 55.0, "G(h)": 812.0, "Gb(n)": 690.5, "Gd(h)": 150.2, "IR(h)": 360.0, "WS10m": 2.4, "WD10m": 90.0, "SP": 84700.0}
            ]
        },
        "meta": {}
    }"#;

    #[test]
    fn test_parse_maps_pvgis_columns() {
        let samples = parse_tmy(SAMPLE_BODY).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2], TmySample { ghi: 812.0, dhi: 150.2, dni: 690.5, temp_air: 24.3 });
    }

    #[test]
    fn test_parse_rejects_empty_series() {
        let body = r#"{"outputs": {"tmy_hourly": []}}"#;
        assert!(matches!(parse_tmy(body), Err(SolarError::WeatherUnavailable(_))));
        assert!(matches!(parse_tmy("<html>"), Err(SolarError::WeatherUnavailable(_))));
    }

    #[test]
    fn test_retime_starts_on_jan_first_and_keeps_count() {
        let samples = vec![TmySample { ghi: 1.0, dhi: 1.0, dni: 1.0, temp_air: 10.0 }; 8784];
        let records = retime(&samples, 2023).unwrap();
        assert_eq!(records.len(), 8784);
        let first = records[0].timestamp;
        assert_eq!((first.year(), first.month(), first.day(), first.hour()), (2023, 1, 1, 0));
        // A leap-year source dataset spills into the next year rather than being trimmed
        let last = records[8783].timestamp;
        assert_eq!((last.year(), last.month(), last.day(), last.hour()), (2024, 1, 1, 23));
        assert!(records.windows(2).all(|w| w[1].timestamp - w[0].timestamp == TimeDelta::hours(1)));
    }

    #[test]
    fn test_static_weather_empty_is_unavailable() {
        let source = StaticWeather::new(vec![]);
        assert!(matches!(source.fetch_typical_year(0.0, 0.0, 2023), Err(SolarError::WeatherUnavailable(_))));
    }

    // ─── PvgisClient against a local listener ───

    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Answers one request with `status` and `body`; yields the request head.
    fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/api/v5_2/", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (base_url, handle)
    }

    fn client(base_url: String) -> PvgisClient {
        PvgisClient::new(&WeatherConfig { base_url, timeout_s: 5 }).unwrap()
    }

    #[test]
    fn test_pvgis_success_is_parsed_and_retimed() {
        let (base_url, server) = serve_once("200 OK", SAMPLE_BODY);
        let records = client(base_url).fetch_typical_year(6.278, -75.577, 2023).unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("GET /api/v5_2/tmy?"), "{}", request);
        assert!(request.contains("lat=6.278") && request.contains("lon=-75.577"), "{}", request);
        assert!(request.contains("outputformat=json"), "{}", request);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].ghi, 812.0);
        assert_eq!(records[2].timestamp.hour(), 2);
    }

    #[test]
    fn test_pvgis_error_status_surfaces_server_message() {
        let body = r#"{"message": "Location over the sea. Please, check your input.", "status": 400}"#;
        let (base_url, server) = serve_once("400 Bad Request", body);
        let err = client(base_url).fetch_typical_year(0.0, -30.0, 2023).unwrap_err();
        server.join().unwrap();

        match err {
            SolarError::WeatherUnavailable(msg) => {
                assert!(msg.contains("Location over the sea"), "{}", msg);
                assert!(msg.contains("400"), "{}", msg);
            }
            other => panic!("expected WeatherUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_pvgis_connection_refused_is_unavailable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = client(format!("http://127.0.0.1:{}/", port))
            .fetch_typical_year(6.278, -75.577, 2023)
            .unwrap_err();
        assert!(matches!(err, SolarError::WeatherUnavailable(_)), "{:?}", err);
    }
}
