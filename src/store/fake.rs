//! An in-memory `StationStore`, for engine and admin-job tests without a
//! real MongoDB. Mirrors the teacher's pattern of fake backends standing in
//! for real network services in tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

use super::models::{ClusterControl, DuplicateInfo, FixOverride, Measurement, ProviderRecord, Station};
use super::StationStore;

#[derive(Default)]
struct State {
    stations: HashMap<String, Station>,
    streams: HashMap<String, Vec<Measurement>>,
    fixes: HashMap<String, FixOverride>,
    providers: HashMap<String, ProviderRecord>,
    cluster_control: Option<ClusterControl>,
}

/// An in-memory station store backed by a `Mutex<HashMap<..>>`.
#[derive(Default)]
pub struct FakeStationStore {
    state: Mutex<State>,
}

impl FakeStationStore {
    pub fn new() -> Self {
        FakeStationStore::default()
    }

    /// Seed a fix override directly, bypassing the adapter-facing API.
    pub fn put_fix(&self, fix: FixOverride) {
        self.state.lock().unwrap().fixes.insert(fix.station_id.clone(), fix);
    }
}

#[async_trait]
impl StationStore for FakeStationStore {
    async fn get_station(&self, station_id: &str) -> Result<Option<Station>> {
        Ok(self.state.lock().unwrap().stations.get(station_id).cloned())
    }

    async fn upsert_station(&self, station: &Station) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .streams
            .entry(station.id.clone())
            .or_insert_with(Vec::new);
        state.stations.insert(station.id.clone(), station.clone());
        Ok(())
    }

    async fn get_fix(&self, station_id: &str) -> Result<Option<FixOverride>> {
        Ok(self.state.lock().unwrap().fixes.get(station_id).cloned())
    }

    async fn has_measure(&self, station_id: &str, ts: i64) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .streams
            .get(station_id)
            .map(|stream| stream.iter().any(|m| m.id == ts))
            .unwrap_or(false))
    }

    async fn insert_measures(&self, station_id: &str, measures: &[Measurement]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        let stream = state.streams.entry(station_id.to_owned()).or_insert_with(Vec::new);
        let mut inserted = 0;
        for measure in measures {
            if !stream.iter().any(|m| m.id == measure.id) {
                stream.push(measure.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn latest_measure(&self, station_id: &str) -> Result<Option<Measurement>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .streams
            .get(station_id)
            .and_then(|stream| stream.iter().max_by_key(|m| m.id).cloned()))
    }

    async fn set_station_last(&self, station_id: &str, measure: &Measurement) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(station) = state.stations.get_mut(station_id) {
            station.last = Some(measure.clone());
        }
        Ok(())
    }

    async fn upsert_provider(
        &self,
        provider_code: &str,
        provider_name: &str,
        url: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .providers
            .entry(provider_code.to_owned())
            .or_insert_with(|| ProviderRecord {
                provider_code: provider_code.to_owned(),
                name: provider_name.to_owned(),
                url: url.map(str::to_owned),
                first_seen_at: now,
                last_seen_at: now,
            });
        entry.name = provider_name.to_owned();
        entry.url = url.map(str::to_owned);
        entry.last_seen_at = now;
        Ok(())
    }

    async fn delete_station(&self, station_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.stations.remove(station_id);
        state.streams.remove(station_id);
        Ok(())
    }

    async fn stations_older_than(
        &self,
        older_than: DateTime<Utc>,
        provider_code: Option<&str>,
    ) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .stations
            .values()
            .filter(|s| s.last_seen_at < older_than)
            .filter(|s| provider_code.map(|code| s.provider_code == code).unwrap_or(true))
            .map(|s| s.id.clone())
            .collect())
    }

    async fn stations_for_clustering(&self, since: DateTime<Utc>) -> Result<Vec<Station>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .stations
            .values()
            .filter(|s| s.status != super::models::StationStatus::Hidden)
            .filter(|s| s.last.as_ref().map(|m| m.time >= since).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn clear_clusters(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for station in state.stations.values_mut() {
            station.clusters.clear();
        }
        Ok(())
    }

    async fn append_cluster_level(&self, station_id: &str, level: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(station) = state.stations.get_mut(station_id) {
            station.clusters.push(level);
        }
        Ok(())
    }

    async fn write_cluster_control(&self, control: &ClusterControl) -> Result<()> {
        self.state.lock().unwrap().cluster_control = Some(control.clone());
        Ok(())
    }

    async fn non_hidden_stations(&self) -> Result<Vec<Station>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .stations
            .values()
            .filter(|s| s.status != super::models::StationStatus::Hidden)
            .cloned()
            .collect())
    }

    async fn clear_duplicates(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for station in state.stations.values_mut() {
            station.duplicates = None;
        }
        Ok(())
    }

    async fn write_duplicates(&self, station_id: &str, info: &DuplicateInfo) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(station) = state.stations.get_mut(station_id) {
            station.duplicates = Some(info.clone());
        }
        Ok(())
    }
}
