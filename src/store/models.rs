//! Document shapes for the station store, per §3 of the data model.
//!
//! Field names and casing (`w-dir`, `w-avg`, `w-max`, `loc`, `tz`) are kept
//! as the original Python models wrote them, since a downstream map UI and
//! public API already read these documents — renaming them would be a
//! breaking change outside this system's scope.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Visibility/quality status of a station, as set by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    Hidden,
    Red,
    Orange,
    Green,
}

/// One physical or virtual sensor site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    #[serde(rename = "_id")]
    pub id: String,
    pub provider_id: String,
    pub provider_code: String,
    pub provider_name: String,
    pub short_name: String,
    pub name: String,
    pub altitude: i64,
    pub is_peak: bool,
    pub loc: GeoPoint,
    pub status: StationStatus,
    pub country_code: Option<String>,
    pub tz: String,
    /// Language tag (or `"default"`) to URL. Always contains `"default"`.
    pub urls: HashMap<String, String>,
    pub last_seen_at: DateTime<Utc>,
    /// Legacy Unix-seconds mirror of `last_seen_at`, kept for downstream
    /// readers that never migrated off it.
    pub seen_unix: i64,
    pub last: Option<Measurement>,
    #[serde(default)]
    pub clusters: Vec<i64>,
    pub duplicates: Option<DuplicateInfo>,
}

/// One observation instant for one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Unix seconds; also the stream's natural sort key and dedup key.
    #[serde(rename = "_id")]
    pub id: i64,
    pub time: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    #[serde(rename = "w-dir")]
    pub wind_direction: i64,
    #[serde(rename = "w-avg")]
    pub wind_avg: f64,
    #[serde(rename = "w-max")]
    pub wind_max: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<PressureFields>,
    pub rain: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureFields {
    pub qfe: Option<f64>,
    pub qnh: Option<f64>,
    pub qff: Option<f64>,
}

impl PressureFields {
    pub fn is_empty(&self) -> bool {
        self.qfe.is_none() && self.qnh.is_none() && self.qff.is_none()
    }
}

/// Manual override row that shadows adapter-supplied fields at save time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixOverride {
    #[serde(rename = "_id")]
    pub station_id: String,
    pub short: Option<String>,
    pub name: Option<String>,
    pub alt: Option<i64>,
    pub peak: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Field name (`"w-dir"`, `"w-avg"`, ...) to additive offset; `w-dir`
    /// offsets wrap modulo 360.
    #[serde(default)]
    pub measures: HashMap<String, f64>,
}

/// `{_id: provider_code, name, url, first_seen_at, last_seen_at}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    #[serde(rename = "_id")]
    pub provider_code: String,
    pub name: String,
    pub url: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// The `{min, max}` control document `save_clusters` writes on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterControl {
    #[serde(rename = "_id")]
    pub id: String,
    pub min: i64,
    pub max: i64,
}

/// Result of `find_duplicates` for one station's group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateInfo {
    pub stations: Vec<String>,
    pub rating: i64,
    pub is_highest_rating: bool,
}
