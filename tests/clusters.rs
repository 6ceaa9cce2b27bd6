//! End-to-end cluster-assignment scenario (spec.md §8 scenario 6): with 100
//! eligible stations, min=20, num=3, levels are `[20, 44, 100]`, and after
//! `save_clusters` exactly that many stations carry each level.

use chrono::Utc;

use winds_mobi_ingest::admin::save_clusters;
use winds_mobi_ingest::geo::GeoPoint;
use winds_mobi_ingest::store::models::{Measurement, Station, StationStatus};
use winds_mobi_ingest::store::{FakeStationStore, StationStore};

fn station_with_measure(id: &str, latitude: f64, longitude: f64) -> Station {
    let now = Utc::now();
    Station {
        id: id.to_owned(),
        provider_id: id.to_owned(),
        provider_code: "test".to_owned(),
        provider_name: "Test".to_owned(),
        short_name: "S".to_owned(),
        name: "Station".to_owned(),
        altitude: 0,
        is_peak: false,
        loc: GeoPoint::new(latitude, longitude).unwrap(),
        status: StationStatus::Green,
        country_code: None,
        tz: "UTC".to_owned(),
        urls: [("default".to_owned(), "https://example.com".to_owned())].into(),
        last_seen_at: now,
        seen_unix: now.timestamp(),
        last: Some(Measurement {
            id: now.timestamp(),
            time: now,
            received_at: now,
            wind_direction: 0,
            wind_avg: 0.0,
            wind_max: 0.0,
            temperature: None,
            humidity: None,
            pressure: None,
            rain: None,
        }),
        clusters: Vec::new(),
        duplicates: None,
    }
}

#[tokio::test]
async fn hundred_stations_yield_levels_20_44_100() {
    let store = FakeStationStore::new();
    // Scatter 100 stations over a 10x10 grid so every cluster count below
    // 100 produces non-trivial groupings.
    for i in 0..100 {
        let lat = 45.0 + (i / 10) as f64 * 0.05;
        let lon = 6.0 + (i % 10) as f64 * 0.05;
        let station = station_with_measure(&format!("s{i}"), lat, lon);
        store.upsert_station(&station).await.unwrap();
    }

    save_clusters(&store, 20, 3).await.unwrap();

    let mut level_counts = std::collections::HashMap::new();
    for i in 0..100 {
        let station = store.get_station(&format!("s{i}")).await.unwrap().unwrap();
        for level in station.clusters {
            *level_counts.entry(level).or_insert(0) += 1;
        }
    }

    assert_eq!(level_counts.get(&20), Some(&20));
    assert_eq!(level_counts.get(&44), Some(&44));
    assert_eq!(level_counts.get(&100), Some(&100));
}

#[tokio::test]
async fn stations_without_measures_are_ineligible() {
    let store = FakeStationStore::new();
    for i in 0..5 {
        let mut station = station_with_measure(&format!("s{i}"), 46.0 + i as f64 * 0.01, 6.0);
        if i == 4 {
            station.last = None;
        }
        store.upsert_station(&station).await.unwrap();
    }

    save_clusters(&store, 2, 2).await.unwrap();

    let excluded = store.get_station("s4").await.unwrap().unwrap();
    assert!(excluded.clusters.is_empty(), "station with no measures must stay out of every level");
}
