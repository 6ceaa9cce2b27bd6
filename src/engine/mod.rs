//! The ingestion engine: the shared contract every adapter calls.
//!
//! Grounded directly on `winds_mobi_provider/provider.py`'s `Provider`
//! class (`save_station`, `create_measure`, `has_measure`,
//! `insert_new_measures`, `__compute_elevation`,
//! `__parse_reverse_geocoding_results`, `__compute_pressures`), redesigned
//! per spec.md §9: no inheritance, an explicit `Engine` value instead of a
//! process-wide singleton, and upstream calls returning result variants
//! instead of raising exceptions.

pub mod elevation;
pub mod geocoding;
pub mod timezone;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tzf_rs::DefaultFinder;

use crate::cache::{elevation_key, geocode_key, timezone_key, CacheRecord, EngineCache};
use crate::errors::{EngineError, Result};
use crate::geo::GeoPoint;
use crate::store::models::{Measurement, PressureFields, Station, StationStatus};
use crate::store::StationStore;
use crate::units::{self, AltitudeUnit, Measured, PressureTriplet, PressureUnit, RainUnit, TemperatureUnit, WindSpeedUnit};

use elevation::{interpret_elevation_response, sample_ring, GoogleElevationResponse};
use geocoding::{parse_geocoded_names, GeocodedNames, GoogleGeocodeResponse};
use timezone::lookup_timezone;

const REVERSE_GEOCODE_MOVE_THRESHOLD_METERS: f64 = 5_000.0;

/// Either a fixed (short, long) name pair, or a function that blends the
/// adapter's own naming with reverse-geocoded names. Replaces the
/// original's "class method or plain tuple" dynamic dispatch.
pub enum Names {
    Fixed(String, String),
    Derived(Box<dyn Fn(&GeocodedNames) -> (String, String) + Send + Sync>),
}

/// Either a single URL (stored under `"default"`) or an already-built
/// language-tag map, which must contain `"default"`.
pub enum UrlInput {
    Single(String),
    Map(HashMap<String, String>),
}

/// The three pressure readings a measurement may carry, each either a raw
/// hPa number or a typed quantity.
#[derive(Default)]
pub struct PressureInput {
    pub qfe: Option<Measured<PressureUnit>>,
    pub qnh: Option<Measured<PressureUnit>>,
    pub qff: Option<Measured<PressureUnit>>,
}

impl PressureInput {
    fn into_triplet(self) -> PressureTriplet {
        PressureTriplet {
            qfe: self.qfe.map(|m| units::round_float(m.to_hpa(), 4, true).unwrap_or(0.0)),
            qnh: self.qnh.map(|m| units::round_float(m.to_hpa(), 4, true).unwrap_or(0.0)),
            qff: self.qff.map(|m| units::round_float(m.to_hpa(), 4, true).unwrap_or(0.0)),
        }
    }
}

pub struct SaveStationInput {
    pub provider_id: String,
    pub names: Names,
    pub latitude: f64,
    pub longitude: f64,
    pub status: StationStatus,
    pub altitude: Option<Measured<AltitudeUnit>>,
    pub timezone: Option<String>,
    pub url: Option<UrlInput>,
}

pub struct MeasureInput {
    pub timestamp_seconds: i64,
    pub wind_direction: Option<i64>,
    pub wind_average: Option<Measured<WindSpeedUnit>>,
    pub wind_maximum: Option<Measured<WindSpeedUnit>>,
    pub temperature: Option<Measured<TemperatureUnit>>,
    pub humidity: Option<f64>,
    pub pressure: PressureInput,
    pub rain: Option<Measured<RainUnit>>,
}

/// `"<provider_code>-<provider_id>"`, stable and globally unique (§3).
pub fn station_id(provider_code: &str, provider_id: &str) -> String {
    format!("{provider_code}-{provider_id}")
}

/// The shared core every adapter and admin job is built on top of.
pub struct Engine {
    store: Arc<dyn StationStore>,
    cache: Arc<EngineCache>,
    http: reqwest::Client,
    google_api_key: String,
    timezone_finder: Arc<DefaultFinder>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn StationStore>,
        cache: Arc<EngineCache>,
        google_api_key: String,
    ) -> Result<Engine> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(7))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EngineError::Fatal(format!("could not build HTTP client: {e}")))?;
        Ok(Engine {
            store,
            cache,
            http,
            google_api_key,
            timezone_finder: Arc::new(DefaultFinder::new()),
        })
    }

    /// Bind this engine to one provider, for use by that provider's
    /// adapter. One adapter owns each provider code (§5).
    pub fn for_provider(self: &Arc<Self>, provider_code: &str, provider_name: &str) -> ProviderHandle {
        ProviderHandle {
            engine: Arc::clone(self),
            provider_code: provider_code.to_owned(),
            provider_name: provider_name.to_owned(),
        }
    }

    async fn reverse_geocode(&self, loc: &GeoPoint, should_call: bool) -> Result<GeocodedNames> {
        let key = geocode_key(loc.latitude(), loc.longitude());
        if let Some(cached) = self.cache.get::<GeocodedNames>(&key).await? {
            return match cached {
                CacheRecord::Success(names) => Ok(names),
                CacheRecord::UsageLimit => Err(EngineError::UsageLimit(format!(
                    "reverse geocoding rate limited, cached at {key}"
                ))),
                CacheRecord::Error => Err(EngineError::UpstreamError(format!(
                    "reverse geocoding previously failed, cached at {key}"
                ))),
            };
        }

        if !should_call {
            // No cache entry and no reason to call (station hasn't moved
            // enough to warrant a fresh lookup): return empty names rather
            // than guessing.
            return Ok(GeocodedNames::default());
        }

        let url = format!(
            "https://maps.googleapis.com/maps/api/geocode/json?latlng={},{}&key={}",
            loc.latitude(),
            loc.longitude(),
            self.google_api_key
        );
        let response = self.http.get(&url).send().await;
        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(EngineError::UpstreamTimeout(e.to_string())),
            Err(e) => return Err(EngineError::UpstreamError(e.to_string())),
        };
        let body: GoogleGeocodeResponse = response
            .json()
            .await
            .map_err(|e| EngineError::UpstreamError(format!("invalid geocoding response: {e}")))?;

        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" => {
                let names = parse_geocoded_names(&body);
                self.cache.set(&key, CacheRecord::Success(names.clone())).await?;
                Ok(names)
            }
            "OVER_QUERY_LIMIT" => {
                self.cache.set::<GeocodedNames>(&key, CacheRecord::UsageLimit).await?;
                Err(EngineError::UsageLimit(
                    body.error_message.unwrap_or_else(|| "OVER_QUERY_LIMIT".to_owned()),
                ))
            }
            other => {
                self.cache.set::<GeocodedNames>(&key, CacheRecord::Error).await?;
                Err(EngineError::UpstreamError(format!(
                    "reverse geocoding failed with status {other}"
                )))
            }
        }
    }

    async fn elevation(&self, loc: &GeoPoint) -> Result<(f64, bool)> {
        let key = elevation_key(loc.latitude(), loc.longitude());
        if let Some(cached) = self.cache.get::<(f64, bool)>(&key).await? {
            return match cached {
                CacheRecord::Success(value) => Ok(value),
                CacheRecord::UsageLimit => Err(EngineError::UsageLimit(format!(
                    "elevation rate limited, cached at {key}"
                ))),
                CacheRecord::Error => Err(EngineError::UpstreamError(format!(
                    "elevation previously failed, cached at {key}"
                ))),
            };
        }

        let mut points = vec![*loc];
        points.extend(sample_ring(loc));
        let locations = points
            .iter()
            .map(|p| format!("{},{}", p.latitude(), p.longitude()))
            .collect::<Vec<_>>()
            .join("|");
        let url = format!(
            "https://maps.googleapis.com/maps/api/elevation/json?locations={}&key={}",
            locations, self.google_api_key
        );
        let response = self.http.get(&url).send().await;
        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(EngineError::UpstreamTimeout(e.to_string())),
            Err(e) => return Err(EngineError::UpstreamError(e.to_string())),
        };
        let body: GoogleElevationResponse = response
            .json()
            .await
            .map_err(|e| EngineError::UpstreamError(format!("invalid elevation response: {e}")))?;

        match body.status.as_str() {
            "OK" => {
                let value = interpret_elevation_response(&body)?;
                self.cache.set(&key, CacheRecord::Success(value)).await?;
                Ok(value)
            }
            "OVER_QUERY_LIMIT" => {
                self.cache.set::<(f64, bool)>(&key, CacheRecord::UsageLimit).await?;
                Err(EngineError::UsageLimit(
                    body.error_message.unwrap_or_else(|| "OVER_QUERY_LIMIT".to_owned()),
                ))
            }
            other => {
                self.cache.set::<(f64, bool)>(&key, CacheRecord::Error).await?;
                Err(EngineError::UpstreamError(format!(
                    "elevation lookup failed with status {other}"
                )))
            }
        }
    }

    async fn timezone_for(&self, loc: &GeoPoint) -> Result<String> {
        let key = timezone_key(loc.latitude(), loc.longitude());
        if let Some(CacheRecord::Success(tz)) = self.cache.get::<String>(&key).await? {
            return Ok(tz);
        }
        let tz = lookup_timezone(&self.timezone_finder, loc.latitude(), loc.longitude());
        self.cache.set(&key, CacheRecord::Success(tz.clone())).await?;
        Ok(tz)
    }
}

/// An adapter's view of the engine, bound to its own provider code. This is
/// the only surface adapters use (§6).
pub struct ProviderHandle {
    engine: Arc<Engine>,
    provider_code: String,
    provider_name: String,
}

impl ProviderHandle {
    pub fn get_station_id(&self, provider_id: &str) -> String {
        station_id(&self.provider_code, provider_id)
    }

    /// §4.1.1.
    pub async fn save_station(&self, input: SaveStationInput) -> Result<Station> {
        let requested_loc = GeoPoint::new(input.latitude, input.longitude)?;
        let station_id = self.get_station_id(&input.provider_id);
        let previous = self.engine.store.get_station(&station_id).await?;

        let moved = previous
            .as_ref()
            .map(|p| p.loc.distance_meters(&requested_loc) >= REVERSE_GEOCODE_MOVE_THRESHOLD_METERS)
            .unwrap_or(true);

        let (mut short_name, mut name, country_code) = match input.names {
            Names::Fixed(short, long) => (short, long, None),
            Names::Derived(blend) => {
                let geocoded = self.engine.reverse_geocode(&requested_loc, moved).await?;
                let country_code = geocoded.country_code.clone();
                let (short, long) = blend(&geocoded);
                (short, long, country_code)
            }
        };
        if short_name.trim().is_empty() || name.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "short_name and name must be non-empty".to_owned(),
            ));
        }

        let need_elevation = input.altitude.is_none() || moved;
        let (mut altitude_m, mut is_peak) = match (need_elevation, input.altitude) {
            (false, Some(altitude)) => (
                altitude.to_meters(),
                previous.as_ref().map(|p| p.is_peak).unwrap_or(false),
            ),
            _ => self.engine.elevation(&requested_loc).await?,
        };

        let timezone = match input.timezone {
            Some(tz) => tz,
            None => self.engine.timezone_for(&requested_loc).await?,
        };

        let mut urls = match input.url {
            Some(UrlInput::Single(u)) => {
                let mut map = HashMap::new();
                map.insert("default".to_owned(), u);
                map
            }
            Some(UrlInput::Map(map)) => {
                if !map.contains_key("default") {
                    return Err(EngineError::InvalidInput(
                        "url map must contain key \"default\"".to_owned(),
                    ));
                }
                map
            }
            None => previous
                .as_ref()
                .map(|p| p.urls.clone())
                .ok_or_else(|| EngineError::InvalidInput("url is required for a new station".to_owned()))?,
        };
        if !urls.contains_key("default") {
            urls.insert("default".to_owned(), String::new());
        }

        let mut loc = requested_loc;
        let fix = self.engine.store.get_fix(&station_id).await?;
        if let Some(fix) = &fix {
            if let Some(short) = &fix.short {
                short_name = short.clone();
            }
            if let Some(long) = &fix.name {
                name = long.clone();
            }
            if let Some(alt) = fix.alt {
                altitude_m = alt as f64;
            }
            if let Some(peak) = fix.peak {
                is_peak = peak;
            }
            if fix.latitude.is_some() || fix.longitude.is_some() {
                let lat = fix.latitude.unwrap_or(loc.latitude());
                let lon = fix.longitude.unwrap_or(loc.longitude());
                loc = GeoPoint::new(lat, lon)?;
            }
        }

        let now = Utc::now();
        let station = Station {
            id: station_id.clone(),
            provider_id: input.provider_id,
            provider_code: self.provider_code.clone(),
            provider_name: self.provider_name.clone(),
            short_name,
            name,
            altitude: units::round_int(altitude_m, true).unwrap_or(0),
            is_peak,
            loc,
            status: input.status,
            country_code,
            tz: timezone,
            urls,
            last_seen_at: now,
            seen_unix: now.timestamp(),
            last: previous.as_ref().and_then(|p| p.last.clone()),
            clusters: previous.as_ref().map(|p| p.clusters.clone()).unwrap_or_default(),
            duplicates: previous.as_ref().and_then(|p| p.duplicates.clone()),
        };

        self.engine.store.upsert_station(&station).await?;
        Ok(station)
    }

    /// §4.1.2.
    pub async fn create_measure(&self, station: &Station, input: MeasureInput) -> Result<Measurement> {
        if input.wind_direction.is_none() && input.wind_average.is_none() && input.wind_maximum.is_none() {
            return Err(EngineError::InvalidInput(
                "at least one of wind_direction, wind_average, wind_maximum is required".to_owned(),
            ));
        }

        let mut wind_direction = units::wrap_degrees(input.wind_direction.unwrap_or(0));
        let mut wind_avg = input
            .wind_average
            .map(|m| units::round_float(m.to_km_h(), 1, true).unwrap_or(0.0))
            .unwrap_or(0.0);
        let mut wind_max = input
            .wind_maximum
            .map(|m| units::round_float(m.to_km_h(), 1, true).unwrap_or(0.0))
            .unwrap_or(0.0);
        let temperature = input.temperature.map(|m| units::round_float(m.to_celsius(), 1, true).unwrap_or(0.0));
        let humidity = input.humidity.and_then(|h| units::round_float(h, 1, false));
        let rain = input.rain.map(|m| units::round_float(m.to_mm(), 1, true).unwrap_or(0.0));

        let triplet = input.pressure.into_triplet();
        let pressure = if triplet.is_empty() {
            None
        } else {
            let completed = triplet.complete(station.altitude as f64, temperature, humidity);
            Some(PressureFields {
                qfe: completed.qfe,
                qnh: completed.qnh,
                qff: completed.qff,
            })
        };

        if let Some(fix) = self.engine.store.get_fix(&station.id).await? {
            if let Some(offset) = fix.measures.get("w-dir") {
                wind_direction = units::wrap_degrees(wind_direction + *offset as i64);
            }
            if let Some(offset) = fix.measures.get("w-avg") {
                wind_avg += offset;
            }
            if let Some(offset) = fix.measures.get("w-max") {
                wind_max += offset;
            }
        }

        let time = Utc
            .timestamp_opt(input.timestamp_seconds, 0)
            .single()
            .ok_or_else(|| EngineError::InvalidInput("invalid timestamp".to_owned()))?;

        Ok(Measurement {
            id: input.timestamp_seconds,
            time,
            received_at: Utc::now(),
            wind_direction,
            wind_avg,
            wind_max,
            temperature,
            humidity,
            pressure,
            rain,
        })
    }

    /// §4.1.3.
    pub async fn has_measure(&self, station: &Station, ts: i64) -> Result<bool> {
        self.engine.store.has_measure(&station.id, ts).await
    }

    /// §4.1.3.
    pub async fn insert_measures(&self, station: &Station, measures: &[Measurement]) -> Result<()> {
        let inserted = self.engine.store.insert_measures(&station.id, measures).await?;
        if inserted == 0 {
            return Ok(());
        }
        if let Some(latest) = self.engine.store.latest_measure(&station.id).await? {
            self.engine.store.set_station_last(&station.id, &latest).await?;
        }
        self.engine
            .store
            .upsert_provider(&self.provider_code, &self.provider_name, None, Utc::now())
            .await?;
        tracing::info!(
            provider = %self.provider_code,
            station = %station.id,
            inserted,
            "inserted measures"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EngineCache;
    use crate::key_value_stores::FakeKeyValueStore;
    use crate::store::FakeStationStore;

    fn test_engine() -> Arc<Engine> {
        let store = Arc::new(FakeStationStore::new());
        let cache = Arc::new(EngineCache::new(Box::new(FakeKeyValueStore::new())));
        Arc::new(Engine::new(store, cache, "test-key".to_owned()).unwrap())
    }

    fn sample_station(engine: &Arc<Engine>) -> ProviderHandle {
        engine.for_provider("test", "Test Provider")
    }

    #[tokio::test]
    async fn save_station_with_fixed_names_round_trips() {
        let engine = test_engine();
        let handle = sample_station(&engine);
        let station = handle
            .save_station(SaveStationInput {
                provider_id: "S1".to_owned(),
                names: Names::Fixed("Bos-cha".to_owned(), "Bos-cha".to_owned()),
                latitude: 46.713,
                longitude: 6.503,
                status: StationStatus::Green,
                altitude: Some(Measured::raw(830.0)),
                timezone: Some("Europe/Zurich".to_owned()),
                url: Some(UrlInput::Single("https://example.com".to_owned())),
            })
            .await
            .unwrap();

        assert_eq!(station.id, "test-S1");
        assert_eq!(station.short_name, "Bos-cha");
        assert_eq!(station.altitude, 830);
        assert_eq!(station.urls.get("default").map(String::as_str), Some("https://example.com"));
    }

    #[tokio::test]
    async fn create_measure_converts_units_and_derives_pressure() {
        let engine = test_engine();
        let handle = sample_station(&engine);
        let station = handle
            .save_station(SaveStationInput {
                provider_id: "S1".to_owned(),
                names: Names::Fixed("Bos-cha".to_owned(), "Bos-cha".to_owned()),
                latitude: 46.713,
                longitude: 6.503,
                status: StationStatus::Green,
                altitude: Some(Measured::raw(830.0)),
                timezone: Some("Europe/Zurich".to_owned()),
                url: Some(UrlInput::Single("https://example.com".to_owned())),
            })
            .await
            .unwrap();

        let measure = handle
            .create_measure(
                &station,
                MeasureInput {
                    timestamp_seconds: 1_700_000_000,
                    wind_direction: Some(180),
                    wind_average: Some(Measured::raw(10.5)),
                    wind_maximum: Some(Measured::raw(20.1)),
                    temperature: Some(Measured::raw(25.7)),
                    humidity: None,
                    pressure: PressureInput {
                        qfe: None,
                        qnh: Some(Measured::raw(1013.0)),
                        qff: None,
                    },
                    rain: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(measure.wind_direction, 180);
        assert_eq!(measure.wind_avg, 10.5);
        assert_eq!(measure.wind_max, 20.1);
        let pressure = measure.pressure.unwrap();
        let qfe = pressure.qfe.unwrap();
        assert!((qfe - 916.49).abs() < 0.5, "got {qfe}");
    }

    #[tokio::test]
    async fn create_measure_rejects_all_wind_fields_missing() {
        let engine = test_engine();
        let handle = sample_station(&engine);
        let station = handle
            .save_station(SaveStationInput {
                provider_id: "S1".to_owned(),
                names: Names::Fixed("Bos-cha".to_owned(), "Bos-cha".to_owned()),
                latitude: 46.713,
                longitude: 6.503,
                status: StationStatus::Green,
                altitude: Some(Measured::raw(830.0)),
                timezone: Some("Europe/Zurich".to_owned()),
                url: Some(UrlInput::Single("https://example.com".to_owned())),
            })
            .await
            .unwrap();

        let result = handle
            .create_measure(
                &station,
                MeasureInput {
                    timestamp_seconds: 1_700_000_000,
                    wind_direction: None,
                    wind_average: None,
                    wind_maximum: None,
                    temperature: None,
                    humidity: None,
                    pressure: PressureInput::default(),
                    rain: None,
                },
            )
            .await;
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn insert_measures_is_idempotent_and_updates_last() {
        let engine = test_engine();
        let handle = sample_station(&engine);
        let station = handle
            .save_station(SaveStationInput {
                provider_id: "S1".to_owned(),
                names: Names::Fixed("Bos-cha".to_owned(), "Bos-cha".to_owned()),
                latitude: 46.713,
                longitude: 6.503,
                status: StationStatus::Green,
                altitude: Some(Measured::raw(830.0)),
                timezone: Some("Europe/Zurich".to_owned()),
                url: Some(UrlInput::Single("https://example.com".to_owned())),
            })
            .await
            .unwrap();

        let measure = handle
            .create_measure(
                &station,
                MeasureInput {
                    timestamp_seconds: 1_700_000_000,
                    wind_direction: Some(180),
                    wind_average: Some(Measured::raw(10.5)),
                    wind_maximum: Some(Measured::raw(20.1)),
                    temperature: None,
                    humidity: None,
                    pressure: PressureInput::default(),
                    rain: None,
                },
            )
            .await
            .unwrap();

        handle.insert_measures(&station, &[measure.clone()]).await.unwrap();
        assert!(handle.has_measure(&station, 1_700_000_000).await.unwrap());

        // Re-inserting the same measure must be a silent no-op.
        handle.insert_measures(&station, &[measure]).await.unwrap();
        let stored = handle.engine.store.get_station(&station.id).await.unwrap().unwrap();
        assert_eq!(stored.last.unwrap().id, 1_700_000_000);
    }
}
