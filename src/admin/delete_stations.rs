//! Station pruning: `delete_stations` (§4.5).
//!
//! Grounded on `admin_jobs/delete_stations.py`: delete every station whose
//! `last_seen_at` predates a threshold, optionally restricted to one
//! provider code, dropping each station's measurement stream along with it.

use chrono::{Duration, Utc};

use crate::errors::Result;
use crate::store::StationStore;

/// Delete every station not seen in `older_than_days` days (optionally
/// restricted to `provider_code`), along with its measurement stream.
/// Returns the number of stations deleted.
pub async fn delete_stations(
    store: &dyn StationStore,
    older_than_days: i64,
    provider_code: Option<&str>,
) -> Result<usize> {
    let threshold = Utc::now() - Duration::days(older_than_days);
    let stale = store.stations_older_than(threshold, provider_code).await?;

    let mut deleted = 0;
    for station_id in &stale {
        tracing::info!(station = %station_id, "deleting station not seen since threshold");
        store.delete_station(station_id).await?;
        deleted += 1;
    }
    tracing::info!(
        provider = provider_code.unwrap_or("any"),
        days = older_than_days,
        deleted,
        "prune complete"
    );
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::geo::GeoPoint;
    use crate::store::models::{Station, StationStatus};
    use crate::store::FakeStationStore;

    fn station(id: &str, provider_code: &str, last_seen_at: chrono::DateTime<Utc>) -> Station {
        Station {
            id: id.to_owned(),
            provider_id: id.to_owned(),
            provider_code: provider_code.to_owned(),
            provider_name: provider_code.to_owned(),
            short_name: "S".to_owned(),
            name: "Station".to_owned(),
            altitude: 0,
            is_peak: false,
            loc: GeoPoint::new(0.0, 0.0).unwrap(),
            status: StationStatus::Green,
            country_code: None,
            tz: "UTC".to_owned(),
            urls: [("default".to_owned(), "https://example.com".to_owned())].into(),
            last_seen_at,
            seen_unix: last_seen_at.timestamp(),
            last: None,
            clusters: Vec::new(),
            duplicates: None,
        }
    }

    #[tokio::test]
    async fn prunes_only_stale_stations() {
        let store = FakeStationStore::new();
        let stale = station("old", "x", Utc::now() - Duration::days(90));
        let fresh = station("new", "x", Utc::now());
        store.upsert_station(&stale).await.unwrap();
        store.upsert_station(&fresh).await.unwrap();

        let deleted = delete_stations(&store, 60, None).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(store.get_station("old").await.unwrap().is_none());
        assert!(store.get_station("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn prunes_only_matching_provider_when_filtered() {
        let store = FakeStationStore::new();
        let old_x = station("old-x", "x", Utc::now() - Duration::days(90));
        let old_y = station("old-y", "y", Utc::now() - Duration::days(90));
        store.upsert_station(&old_x).await.unwrap();
        store.upsert_station(&old_y).await.unwrap();

        let deleted = delete_stations(&store, 60, Some("x")).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(store.get_station("old-x").await.unwrap().is_none());
        assert!(store.get_station("old-y").await.unwrap().is_some());
    }
}
