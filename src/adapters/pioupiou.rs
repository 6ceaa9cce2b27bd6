//! Pioupiou / openwindmap.org: a derived-names adapter fetching every
//! station from a single "all stations" endpoint.
//!
//! Grounded on `providers/pioupiou.py`: one GET, a per-station status
//! derived from the station's own `location_date`/`location_status`/`state`
//! fields, then `save_station` with no fixed name (left to reverse
//! geocoding) and a single measure built from the station's latest reading.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::engine::{Engine, MeasureInput, Names, PressureInput, SaveStationInput, UrlInput};
use crate::errors::{swallow_station_error, EngineError, Result};
use crate::store::models::StationStatus;
use crate::units::Measured;

const PROVIDER_CODE: &str = "pioupiou";
const PROVIDER_NAME: &str = "openwindmap.org";
const PROVIDER_URL: &str = "https://www.openwindmap.org";
/// A station's last known location is considered stale past this age.
const LOCATION_STALE_DAYS: i64 = 15;

#[derive(Deserialize)]
struct LiveWithMetaAll {
    data: Vec<PiouStation>,
}

#[derive(Deserialize)]
struct PiouStation {
    id: i64,
    location: PiouLocation,
    status: PiouStatus,
    measurements: PiouMeasurements,
    meta: Option<PiouMeta>,
}

#[derive(Deserialize)]
struct PiouLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
    date: Option<String>,
    success: bool,
}

#[derive(Deserialize)]
struct PiouStatus {
    state: String,
}

#[derive(Deserialize)]
struct PiouMeasurements {
    date: String,
    wind_heading: i64,
    wind_speed_avg: f64,
    wind_speed_max: f64,
    pressure: Option<f64>,
}

#[derive(Deserialize)]
struct PiouMeta {
    name: Option<String>,
}

fn station_status(state: &str, location_date: Option<DateTime<Utc>>, location_success: bool) -> StationStatus {
    if state != "on" {
        return StationStatus::Hidden;
    }
    let up_to_date = match location_date {
        Some(date) => (Utc::now() - date).num_seconds() < LOCATION_STALE_DAYS * 24 * 3600,
        None => return StationStatus::Red,
    };
    if location_success && up_to_date {
        StationStatus::Green
    } else {
        StationStatus::Orange
    }
}

pub struct PioupiouAdapter {
    engine: Arc<Engine>,
    http: reqwest::Client,
}

impl PioupiouAdapter {
    pub fn new(engine: &Arc<Engine>, http: reqwest::Client) -> PioupiouAdapter {
        PioupiouAdapter { engine: Arc::clone(engine), http }
    }
}

#[async_trait::async_trait]
impl super::Adapter for PioupiouAdapter {
    fn provider_code(&self) -> &str {
        PROVIDER_CODE
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(5 * 60)
    }

    async fn run(&self) -> Result<()> {
        let handle = self.engine.for_provider(PROVIDER_CODE, PROVIDER_NAME);
        let response = self
            .http
            .get("https://api.pioupiou.fr/v1/live-with-meta/all")
            .send()
            .await
            .map_err(|e| EngineError::UpstreamError(e.to_string()))?;
        let body: LiveWithMetaAll = response
            .json()
            .await
            .map_err(|e| EngineError::UpstreamError(format!("invalid pioupiou response: {e}")))?;

        for piou in body.data {
            let station_ref = piou.id.to_string();
            if let Err(err) = self.process_station(&handle, piou).await {
                swallow_station_error(PROVIDER_CODE, &station_ref, err)?;
            }
        }
        Ok(())
    }
}

impl PioupiouAdapter {
    async fn process_station(&self, handle: &crate::engine::ProviderHandle, piou: PiouStation) -> Result<()> {
        let (latitude, longitude) = match (piou.location.latitude, piou.location.longitude) {
            (Some(lat), Some(lon)) if !(lat == 0.0 && lon == 0.0) => (lat, lon),
            _ => return Ok(()),
        };
        let location_date = piou
            .location
            .date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc));
        let status = station_status(&piou.status.state, location_date, piou.location.success);

        let default_name = piou.meta.and_then(|m| m.name);
        let names = match default_name {
            Some(name) => Names::Fixed(name.clone(), name),
            None => Names::Derived(Box::new(|geocoded| {
                (
                    geocoded.short.clone().unwrap_or_default(),
                    geocoded.long.clone().unwrap_or_default(),
                )
            })),
        };

        let station = handle
            .save_station(SaveStationInput {
                provider_id: piou.id.to_string(),
                names,
                latitude,
                longitude,
                status,
                altitude: None,
                timezone: None,
                url: Some(UrlInput::Single(format!("{PROVIDER_URL}/PP{}", piou.id))),
            })
            .await?;

        let timestamp = DateTime::parse_from_rfc3339(&piou.measurements.date)
            .map_err(|e| EngineError::UpstreamError(format!("invalid measure timestamp: {e}")))?
            .timestamp();
        if handle.has_measure(&station, timestamp).await? {
            return Ok(());
        }

        let measure = handle
            .create_measure(
                &station,
                MeasureInput {
                    timestamp_seconds: timestamp,
                    wind_direction: Some(piou.measurements.wind_heading),
                    wind_average: Some(Measured::raw(piou.measurements.wind_speed_avg)),
                    wind_maximum: Some(Measured::raw(piou.measurements.wind_speed_max)),
                    temperature: None,
                    humidity: None,
                    pressure: PressureInput {
                        qfe: piou.measurements.pressure.map(Measured::raw),
                        qnh: None,
                        qff: None,
                    },
                    rain: None,
                },
            )
            .await?;

        handle.insert_measures(&station, &[measure]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_with_fresh_and_successful_location_is_green() {
        let status = station_status("on", Some(Utc::now()), true);
        assert_eq!(status, StationStatus::Green);
    }

    #[test]
    fn on_with_stale_location_is_orange() {
        let stale = Utc::now() - chrono::Duration::days(LOCATION_STALE_DAYS + 1);
        let status = station_status("on", Some(stale), true);
        assert_eq!(status, StationStatus::Orange);
    }

    #[test]
    fn on_without_location_date_is_red() {
        let status = station_status("on", None, true);
        assert_eq!(status, StationStatus::Red);
    }

    #[test]
    fn off_is_hidden_regardless_of_location() {
        let status = station_status("off", Some(Utc::now()), true);
        assert_eq!(status, StationStatus::Hidden);
    }
}
