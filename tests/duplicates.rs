//! End-to-end duplicate-detection scenario (spec.md §8 scenario 5): two
//! stations within 50 m of one another land in one duplicate group, and the
//! station with the fresher measurement is flagged as the highest-rated.

use chrono::{TimeZone, Utc};

use winds_mobi_ingest::admin::find_duplicates;
use winds_mobi_ingest::geo::GeoPoint;
use winds_mobi_ingest::store::models::{Measurement, Station, StationStatus};
use winds_mobi_ingest::store::{FakeStationStore, StationStore};

fn station(id: &str, latitude: f64, longitude: f64, measure_age_seconds: Option<i64>) -> Station {
    let now = Utc::now();
    let last = measure_age_seconds.map(|age| {
        let ts = now.timestamp() - age;
        Measurement {
            id: ts,
            time: Utc.timestamp_opt(ts, 0).unwrap(),
            received_at: now,
            wind_direction: 0,
            wind_avg: 0.0,
            wind_max: 0.0,
            temperature: None,
            humidity: None,
            pressure: None,
            rain: None,
        }
    });
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
        last,
        clusters: Vec::new(),
        duplicates: None,
    }
}

#[tokio::test]
async fn nearby_stations_form_a_group_with_a_single_highest_rating() {
    let store = FakeStationStore::new();
    let fresher = station("a", 46.0, 6.0, Some(60));
    let staler = station("b", 46.00005, 6.00005, Some(3600 * 6));
    let distant = station("c", 10.0, 10.0, Some(60));
    for s in [&fresher, &staler, &distant] {
        store.upsert_station(s).await.unwrap();
    }

    find_duplicates(&store, 50.0).await.unwrap();

    let a = store.get_station("a").await.unwrap().unwrap();
    let b = store.get_station("b").await.unwrap().unwrap();
    let c = store.get_station("c").await.unwrap().unwrap();

    let dup_a = a.duplicates.expect("nearby station a should be flagged");
    let dup_b = b.duplicates.expect("nearby station b should be flagged");
    assert_eq!(dup_a.stations, dup_b.stations);
    assert!(dup_a.is_highest_rating, "the fresher station should win");
    assert!(!dup_b.is_highest_rating);
    assert!(c.duplicates.is_none());
}
