//! Near-duplicate station detection: `find_duplicates` (§4.4).
//!
//! Grounded directly on `admin_jobs/find_duplicates.py`: Ward-linkage
//! clustering with no fixed cluster count, cut at a distance threshold, then
//! a per-station quality rating used to pick one representative per group.

use chrono::Utc;

use crate::errors::Result;
use crate::store::models::{DuplicateInfo, Station, StationStatus};
use crate::store::StationStore;

use super::ward::cluster_by_distance;

/// Provider codes whose stations get a small rating bonus, because they are
/// generally better maintained than an arbitrary duplicate (§4.4 step 3,
/// and spec.md §9's open question: made configurable here rather than
/// hard-coded, via [`find_duplicates_with_preferred_providers`]).
pub const DEFAULT_PREFERRED_PROVIDERS: &[&str] = &["meteoswiss", "pioupiou"];

const FRESH_30_MIN_SECONDS: i64 = 30 * 60;
const FRESH_1_HOUR_SECONDS: i64 = 3_600;
const FRESH_5_DAYS_SECONDS: i64 = 5 * 24 * 3_600;

/// Geographic degrees-of-arc proxy `find_duplicates.py` uses for "meters":
/// the grid the map uses treats one degree as spanning roughly this many
/// meters, so the Ward dendrogram is cut at `distance / 100000`. This is a
/// coarse approximation documented verbatim from the source rather than a
/// proper planar projection (spec.md §9 Open Questions).
const DEGREES_PER_METER_PROXY: f64 = 1.0 / 100_000.0;

/// Quality rating for one station inside a duplicate group, per §4.4 step 3.
/// Higher is better; the highest-rated station in a group becomes its
/// representative.
pub fn station_rating(station: &Station, now_unix: i64, preferred_providers: &[&str]) -> i64 {
    match station.status {
        StationStatus::Orange => return 5,
        StationStatus::Red => return 1,
        StationStatus::Hidden | StationStatus::Green => {}
    }

    let mut rating = 20i64;

    if let Some(last) = &station.last {
        let age = now_unix - last.id;
        if age < FRESH_30_MIN_SECONDS {
            rating += 25;
        } else if age < FRESH_1_HOUR_SECONDS {
            rating += 20;
        } else if age < FRESH_5_DAYS_SECONDS {
            rating += 5;
        }
        rating += 2;
    }

    if preferred_providers.contains(&station.provider_code.as_str()) {
        rating += 1;
    }

    if station.short_name != station.name {
        rating += 1;
    }

    rating
}

/// Run `find_duplicates` with the default preferred-provider list.
pub async fn find_duplicates(store: &dyn StationStore, distance_meters: f64) -> Result<()> {
    find_duplicates_with_preferred_providers(store, distance_meters, DEFAULT_PREFERRED_PROVIDERS).await
}

/// Run `find_duplicates`: cluster non-hidden stations within `distance_meters`
/// of one another and flag every group of size > 1 as duplicates, recording
/// a quality rating and the single highest-rated member on every member.
pub async fn find_duplicates_with_preferred_providers(
    store: &dyn StationStore,
    distance_meters: f64,
    preferred_providers: &[&str],
) -> Result<()> {
    store.clear_duplicates().await?;

    let stations = store.non_hidden_stations().await?;
    if stations.len() < 2 {
        return Ok(());
    }

    let points: Vec<(f64, f64)> = stations
        .iter()
        .map(|s| (s.loc.longitude(), s.loc.latitude()))
        .collect();
    let threshold = distance_meters * DEGREES_PER_METER_PROXY;
    let labels = cluster_by_distance(&points, threshold);

    let mut members_by_label: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
    for (i, label) in labels.into_iter().enumerate() {
        members_by_label.entry(label).or_default().push(i);
    }

    let now = Utc::now().timestamp();
    for members in members_by_label.values() {
        if members.len() < 2 {
            continue;
        }
        let ratings: Vec<i64> = members
            .iter()
            .map(|&i| station_rating(&stations[i], now, preferred_providers))
            .collect();
        let highest_index = ratings
            .iter()
            .enumerate()
            .max_by_key(|&(_, rating)| *rating)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        let station_ids: Vec<String> = members.iter().map(|&i| stations[i].id.clone()).collect();

        for (position, &i) in members.iter().enumerate() {
            let info = DuplicateInfo {
                stations: station_ids.clone(),
                rating: ratings[position],
                is_highest_rating: position == highest_index,
            };
            store.write_duplicates(&stations[i].id, &info).await?;
        }
    }

    Ok(())
}
