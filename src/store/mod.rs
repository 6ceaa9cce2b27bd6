//! Station store: the document database behind the ingestion engine and
//! admin jobs. A `StationStore` implementation backs `stations`,
//! per-station measurement streams, `stations_fix`, `providers` and
//! `stations_clusters`, per §3/§6.

mod fake;
mod mongo;

pub mod models;

pub use fake::FakeStationStore;
pub use mongo::MongoStationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use models::{ClusterControl, DuplicateInfo, FixOverride, Measurement, Station};

/// The document-store contract the ingestion engine and admin jobs depend
/// on. Kept narrow and fully testable against [`FakeStationStore`].
#[async_trait]
pub trait StationStore: Send + Sync + 'static {
    async fn get_station(&self, station_id: &str) -> Result<Option<Station>>;

    /// Full-field upsert, per §4.1.1 step 7.
    async fn upsert_station(&self, station: &Station) -> Result<()>;

    async fn get_fix(&self, station_id: &str) -> Result<Option<FixOverride>>;

    async fn has_measure(&self, station_id: &str, ts: i64) -> Result<bool>;

    /// Bulk, unordered insert; duplicates by `_id` are silently dropped.
    /// Returns the number of measures actually inserted.
    async fn insert_measures(&self, station_id: &str, measures: &[Measurement]) -> Result<usize>;

    /// The stream document with the largest `_id`, if any.
    async fn latest_measure(&self, station_id: &str) -> Result<Option<Measurement>>;

    async fn set_station_last(&self, station_id: &str, measure: &Measurement) -> Result<()>;

    async fn upsert_provider(
        &self,
        provider_code: &str,
        provider_name: &str,
        url: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Delete a station document and its measurement stream.
    async fn delete_station(&self, station_id: &str) -> Result<()>;

    /// Station ids whose `last_seen_at` predates `older_than`, optionally
    /// restricted to one provider code.
    async fn stations_older_than(
        &self,
        older_than: DateTime<Utc>,
        provider_code: Option<&str>,
    ) -> Result<Vec<String>>;

    /// Non-hidden stations whose newest measure is within `since`, for
    /// cluster-level assignment.
    async fn stations_for_clustering(&self, since: DateTime<Utc>) -> Result<Vec<Station>>;

    async fn clear_clusters(&self) -> Result<()>;

    async fn append_cluster_level(&self, station_id: &str, level: i64) -> Result<()>;

    async fn write_cluster_control(&self, control: &ClusterControl) -> Result<()>;

    /// All non-hidden stations, for duplicate detection.
    async fn non_hidden_stations(&self) -> Result<Vec<Station>>;

    async fn clear_duplicates(&self) -> Result<()>;

    async fn write_duplicates(&self, station_id: &str, info: &DuplicateInfo) -> Result<()>;
}
