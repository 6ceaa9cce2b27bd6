//! Holfuy: a fixed-names adapter joining two endpoints (station list and
//! live measurements) and publishing a multi-language `url` map.
//!
//! Grounded on `providers/holfuy.py`: a station's own name is both its
//! short and long name, missing geolocation is a hard per-station error, and
//! wind/temperature/pressure arrive pre-labelled with their unit (km/h, degC,
//! hPa) rather than needing inference.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use serde::Deserialize;

use crate::engine::{Engine, MeasureInput, Names, PressureInput, SaveStationInput, UrlInput};
use crate::errors::{swallow_station_error, EngineError, Result};
use crate::store::models::StationStatus;
use crate::units::{Measured, PressureUnit, TemperatureUnit, WindSpeedUnit};

const PROVIDER_CODE: &str = "holfuy";
const PROVIDER_NAME: &str = "holfuy.com";
const PROVIDER_URL: &str = "https://holfuy.com";

#[derive(Deserialize)]
struct StationsResponse {
    #[serde(rename = "holfuyStationsList")]
    holfuy_stations_list: Vec<HolfuyStation>,
}

#[derive(Deserialize)]
struct HolfuyStation {
    id: i64,
    name: String,
    location: HolfuyLocation,
}

#[derive(Deserialize)]
struct HolfuyLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Deserialize)]
struct LiveResponse {
    measurements: Vec<HolfuyMeasure>,
}

#[derive(Deserialize)]
struct HolfuyMeasure {
    #[serde(rename = "stationId")]
    station_id: i64,
    #[serde(rename = "dateTime")]
    date_time: String,
    wind: HolfuyWind,
    temperature: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Deserialize)]
struct HolfuyWind {
    direction: i64,
    speed: f64,
    gust: f64,
}

pub struct HolfuyAdapter {
    engine: Arc<Engine>,
    http: reqwest::Client,
}

impl HolfuyAdapter {
    pub fn new(engine: &Arc<Engine>, http: reqwest::Client) -> HolfuyAdapter {
        HolfuyAdapter { engine: Arc::clone(engine), http }
    }
}

#[async_trait::async_trait]
impl super::Adapter for HolfuyAdapter {
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

        let stations: StationsResponse = self
            .http
            .get("https://api.holfuy.com/stations/stations.json")
            .send()
            .await
            .map_err(|e| EngineError::UpstreamError(e.to_string()))?
            .json()
            .await
            .map_err(|e| EngineError::UpstreamError(format!("invalid holfuy stations response: {e}")))?;

        let live: LiveResponse = self
            .http
            .get("https://api.holfuy.com/live/?s=all&m=JSON&tu=C&su=km/h&utc")
            .send()
            .await
            .map_err(|e| EngineError::UpstreamError(e.to_string()))?
            .json()
            .await
            .map_err(|e| EngineError::UpstreamError(format!("invalid holfuy live response: {e}")))?;

        let measures_by_station: HashMap<i64, HolfuyMeasure> =
            live.measurements.into_iter().map(|m| (m.station_id, m)).collect();

        for station in stations.holfuy_stations_list {
            let station_ref = station.id.to_string();
            if let Err(err) = self.process_station(&handle, station, &measures_by_station).await {
                swallow_station_error(PROVIDER_CODE, &station_ref, err)?;
            }
        }
        Ok(())
    }
}

impl HolfuyAdapter {
    async fn process_station(
        &self,
        handle: &crate::engine::ProviderHandle,
        station: HolfuyStation,
        measures_by_station: &HashMap<i64, HolfuyMeasure>,
    ) -> Result<()> {
        let (latitude, longitude) = match (station.location.latitude, station.location.longitude) {
            (Some(lat), Some(lon)) if !(lat == 0.0 && lon == 0.0) => (lat, lon),
            _ => return Err(EngineError::InvalidInput("no geolocation found".to_owned())),
        };

        let mut urls = HashMap::new();
        for lang in ["default", "en", "de", "fr", "it"] {
            let path = if lang == "default" { "en" } else { lang };
            urls.insert(lang.to_owned(), format!("{PROVIDER_URL}/{path}/weather/{}", station.id));
        }

        let saved = handle
            .save_station(SaveStationInput {
                provider_id: station.id.to_string(),
                names: Names::Fixed(station.name.clone(), station.name.clone()),
                latitude,
                longitude,
                status: StationStatus::Green,
                altitude: None,
                timezone: None,
                url: Some(UrlInput::Map(urls)),
            })
            .await?;

        let measure = measures_by_station.get(&station.id).ok_or_else(|| {
            EngineError::InvalidInput(format!("station '{}' not found in live measurements", station.name))
        })?;

        let timestamp = DateTime::parse_from_rfc3339(&measure.date_time)
            .map_err(|e| EngineError::UpstreamError(format!("invalid measure timestamp: {e}")))?
            .timestamp();
        if handle.has_measure(&saved, timestamp).await? {
            return Ok(());
        }

        let created = handle
            .create_measure(
                &saved,
                MeasureInput {
                    timestamp_seconds: timestamp,
                    wind_direction: Some(measure.wind.direction),
                    wind_average: Some(Measured::with_unit(measure.wind.speed, WindSpeedUnit::KilometersPerHour)),
                    wind_maximum: Some(Measured::with_unit(measure.wind.gust, WindSpeedUnit::KilometersPerHour)),
                    temperature: measure.temperature.map(|t| Measured::with_unit(t, TemperatureUnit::Celsius)),
                    humidity: None,
                    pressure: PressureInput {
                        qfe: None,
                        qnh: measure.pressure.map(|p| Measured::with_unit(p, PressureUnit::Hectopascal)),
                        qff: None,
                    },
                    rain: None,
                },
            )
            .await?;

        handle.insert_measures(&saved, &[created]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_map_carries_all_languages_with_default_aliasing_english() {
        let mut urls = HashMap::new();
        for lang in ["default", "en", "de", "fr", "it"] {
            let path = if lang == "default" { "en" } else { lang };
            urls.insert(lang.to_owned(), format!("{PROVIDER_URL}/{path}/weather/42"));
        }
        assert_eq!(urls.get("default"), urls.get("en"));
        assert_eq!(urls.get("de").unwrap(), "https://holfuy.com/de/weather/42");
        assert_eq!(urls.len(), 5);
    }
}
