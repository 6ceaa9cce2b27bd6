//! MongoDB-backed `StationStore`.
//!
//! Grounded on `winds_mobi_provider/db.py`'s collection layout: `stations`,
//! one capped/TTL'd collection per station id for the measurement stream,
//! `stations_fix`, `providers`, and the `stations_clusters` control
//! document.

use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::{FindOneOptions, IndexOptions, InsertManyOptions};
use mongodb::{Collection, Database, IndexModel};

use crate::errors::Result;

use super::models::{ClusterControl, DuplicateInfo, FixOverride, Measurement, ProviderRecord, Station};
use super::StationStore;

/// Measurement streams auto-expire after this many seconds (~10 days).
const MEASUREMENT_STREAM_TTL_SECONDS: i64 = 10 * 86_400;

pub struct MongoStationStore {
    db: Database,
}

impl MongoStationStore {
    pub fn new(db: Database) -> Self {
        MongoStationStore { db }
    }

    fn stations(&self) -> Collection<Station> {
        self.db.collection("stations")
    }

    fn fixes(&self) -> Collection<FixOverride> {
        self.db.collection("stations_fix")
    }

    fn providers(&self) -> Collection<ProviderRecord> {
        self.db.collection("providers")
    }

    fn cluster_control(&self) -> Collection<ClusterControl> {
        self.db.collection("stations_clusters")
    }

    fn stream(&self, station_id: &str) -> Collection<Measurement> {
        self.db.collection(station_id)
    }

    /// Create the measurement stream's TTL index on `time`, if missing.
    /// Idempotent: mirrors `__create_station`'s `ensure_index` call, run
    /// once per station the first time its stream is touched.
    async fn ensure_stream_ttl_index(&self, station_id: &str) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "time": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(std::time::Duration::from_secs(
                        MEASUREMENT_STREAM_TTL_SECONDS as u64,
                    ))
                    .build(),
            )
            .build();
        self.stream(station_id).create_index(index).await?;
        Ok(())
    }
}

#[async_trait]
impl StationStore for MongoStationStore {
    async fn get_station(&self, station_id: &str) -> Result<Option<Station>> {
        Ok(self.stations().find_one(doc! { "_id": station_id }).await?)
    }

    async fn upsert_station(&self, station: &Station) -> Result<()> {
        self.ensure_stream_ttl_index(&station.id).await?;
        let doc = bson::to_document(station)
            .map_err(|e| crate::errors::EngineError::TransientStorage(e.to_string()))?;
        self.stations()
            .replace_one(doc! { "_id": &station.id }, doc)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn get_fix(&self, station_id: &str) -> Result<Option<FixOverride>> {
        Ok(self.fixes().find_one(doc! { "_id": station_id }).await?)
    }

    async fn has_measure(&self, station_id: &str, ts: i64) -> Result<bool> {
        let found = self
            .stream(station_id)
            .find_one(doc! { "_id": ts })
            .await?;
        Ok(found.is_some())
    }

    async fn insert_measures(&self, station_id: &str, measures: &[Measurement]) -> Result<usize> {
        if measures.is_empty() {
            return Ok(0);
        }
        let options = InsertManyOptions::builder().ordered(false).build();
        match self.stream(station_id).insert_many(measures).with_options(options).await {
            Ok(result) => Ok(result.inserted_ids.len()),
            // Unordered inserts still return a bulk-write error when some
            // documents are duplicate keys; the non-duplicate ones are
            // still committed, so we report those as inserted.
            Err(err) => match *err.kind {
                mongodb::error::ErrorKind::InsertMany(mongodb::error::InsertManyError {
                    ref write_errors,
                    ..
                }) => Ok(measures.len() - write_errors.len()),
                _ => Err(err.into()),
            },
        }
    }

    async fn latest_measure(&self, station_id: &str) -> Result<Option<Measurement>> {
        let options = FindOneOptions::builder().sort(doc! { "_id": -1 }).build();
        Ok(self
            .stream(station_id)
            .find_one(Document::new())
            .with_options(options)
            .await?)
    }

    async fn set_station_last(&self, station_id: &str, measure: &Measurement) -> Result<()> {
        let doc = bson::to_document(measure)
            .map_err(|e| crate::errors::EngineError::TransientStorage(e.to_string()))?;
        self.stations()
            .update_one(doc! { "_id": station_id }, doc! { "$set": { "last": doc } })
            .await?;
        Ok(())
    }

    async fn upsert_provider(
        &self,
        provider_code: &str,
        provider_name: &str,
        url: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let now_bson = bson::DateTime::from_chrono(now);
        self.providers()
            .update_one(
                doc! { "_id": provider_code },
                doc! {
                    "$set": { "name": provider_name, "url": url, "last_seen_at": now_bson },
                    "$setOnInsert": { "first_seen_at": now_bson },
                },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete_station(&self, station_id: &str) -> Result<()> {
        self.stations().delete_one(doc! { "_id": station_id }).await?;
        self.stream(station_id).drop().await?;
        Ok(())
    }

    async fn stations_older_than(
        &self,
        older_than: DateTime<Utc>,
        provider_code: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut filter = doc! { "last_seen_at": { "$lt": bson::DateTime::from_chrono(older_than) } };
        if let Some(code) = provider_code {
            filter.insert("provider_code", code);
        }
        let mut cursor = self.stations().find(filter).await?;
        let mut ids = Vec::new();
        use futures::stream::TryStreamExt;
        while let Some(station) = cursor.try_next().await? {
            ids.push(station.id);
        }
        Ok(ids)
    }

    async fn stations_for_clustering(&self, since: DateTime<Utc>) -> Result<Vec<Station>> {
        let filter = doc! {
            "status": { "$ne": "hidden" },
            "last.time": { "$gte": bson::DateTime::from_chrono(since) },
        };
        let mut cursor = self.stations().find(filter).await?;
        let mut stations = Vec::new();
        use futures::stream::TryStreamExt;
        while let Some(station) = cursor.try_next().await? {
            stations.push(station);
        }
        Ok(stations)
    }

    async fn clear_clusters(&self) -> Result<()> {
        self.stations()
            .update_many(Document::new(), doc! { "$set": { "clusters": [] } })
            .await?;
        Ok(())
    }

    async fn append_cluster_level(&self, station_id: &str, level: i64) -> Result<()> {
        self.stations()
            .update_one(doc! { "_id": station_id }, doc! { "$push": { "clusters": level } })
            .await?;
        Ok(())
    }

    async fn write_cluster_control(&self, control: &ClusterControl) -> Result<()> {
        let doc = bson::to_document(control)
            .map_err(|e| crate::errors::EngineError::TransientStorage(e.to_string()))?;
        self.cluster_control()
            .replace_one(doc! { "_id": &control.id }, doc)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn non_hidden_stations(&self) -> Result<Vec<Station>> {
        let mut cursor = self
            .stations()
            .find(doc! { "status": { "$ne": "hidden" } })
            .await?;
        let mut stations = Vec::new();
        use futures::stream::TryStreamExt;
        while let Some(station) = cursor.try_next().await? {
            stations.push(station);
        }
        Ok(stations)
    }

    async fn clear_duplicates(&self) -> Result<()> {
        self.stations()
            .update_many(Document::new(), doc! { "$set": { "duplicates": bson::Bson::Null } })
            .await?;
        Ok(())
    }

    async fn write_duplicates(&self, station_id: &str, info: &DuplicateInfo) -> Result<()> {
        let doc = bson::to_document(info)
            .map_err(|e| crate::errors::EngineError::TransientStorage(e.to_string()))?;
        self.stations()
            .update_one(doc! { "_id": station_id }, doc! { "$set": { "duplicates": doc } })
            .await?;
        Ok(())
    }
}

