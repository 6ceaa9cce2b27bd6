//! Cluster-level assignment: `save_clusters` (§4.3).
//!
//! Grounded on `admin_jobs/save_clusters.py`: a geometric sequence of
//! cluster counts, one Ward clustering pass per count, and a
//! closest-to-centroid representative pick per cluster with a
//! freshest-measure tie-break.

use std::collections::BTreeSet;

use chrono::{Duration, Utc};

use crate::errors::Result;
use crate::store::models::{ClusterControl, Station};
use crate::store::StationStore;

use super::ward::cluster_into_k;

/// Stations are only eligible for cluster-level assignment if their newest
/// measure is within this window.
const ELIGIBILITY_WINDOW_DAYS: i64 = 30;

/// `levels = geomspace(min, n, num)`, matching `numpy.geomspace(min, n,
/// num=num).astype(int)`: numpy's integer cast truncates towards zero, it
/// does not round, so e.g. `geomspace(20, 100, 3)` is `[20, 44, 100]`, not
/// `[20, 45, 100]`.
pub fn geomspace_levels(min: usize, n: usize, num: usize) -> Vec<usize> {
    if num == 0 || n == 0 || min == 0 {
        return Vec::new();
    }
    if num == 1 {
        return vec![min.min(n)];
    }
    let min_f = min as f64;
    let n_f = n as f64;
    (0..num)
        .map(|i| {
            let t = i as f64 / (num as f64 - 1.0);
            (min_f * (n_f / min_f).powf(t)).max(1.0) as usize
        })
        .collect()
}

/// Pick the representative station for one cluster: the member closest to
/// the cluster's centroid, tie-broken by the freshest measure when several
/// members share that closest point's exact coordinate. Returns `None`
/// when every tied member lacks a measure entirely (skip this cluster at
/// this level).
fn pick_representative(stations: &[&Station], members: &[usize]) -> Option<usize> {
    if members.len() == 1 {
        return Some(members[0]);
    }

    let n = members.len() as f64;
    let (sum_lon, sum_lat) = members.iter().fold((0.0, 0.0), |(lon, lat), &i| {
        (lon + stations[i].loc.longitude(), lat + stations[i].loc.latitude())
    });
    let centroid = (sum_lon / n, sum_lat / n);

    let mut best_idx = members[0];
    let mut best_dist = f64::INFINITY;
    for &i in members {
        let s = stations[i];
        let d = ((s.loc.longitude() - centroid.0).powi(2) + (s.loc.latitude() - centroid.1).powi(2)).sqrt();
        if d < best_dist {
            best_dist = d;
            best_idx = i;
        }
    }

    let best_coord = (stations[best_idx].loc.longitude(), stations[best_idx].loc.latitude());
    let tied: Vec<usize> = members
        .iter()
        .copied()
        .filter(|&i| {
            let s = stations[i];
            (s.loc.longitude(), s.loc.latitude()) == best_coord
        })
        .collect();

    if tied.len() == 1 {
        return Some(best_idx);
    }
    tied.into_iter()
        .filter(|&i| stations[i].last.is_some())
        .max_by_key(|&i| stations[i].last.as_ref().map(|m| m.id).unwrap_or(i64::MIN))
}

/// Run `save_clusters`: assign cluster-level representatives for `num`
/// geometrically-spaced cluster counts between `min` and the number of
/// eligible stations.
pub async fn save_clusters(store: &dyn StationStore, min: i64, num: i64) -> Result<()> {
    let since = Utc::now() - Duration::days(ELIGIBILITY_WINDOW_DAYS);
    let eligible = store.stations_for_clustering(since).await?;
    let n = eligible.len();

    store
        .write_cluster_control(&ClusterControl {
            id: "save_clusters".to_owned(),
            min,
            max: n as i64,
        })
        .await?;

    store.clear_clusters().await?;

    if n == 0 {
        return Ok(());
    }

    let refs: Vec<&Station> = eligible.iter().collect();
    let points: Vec<(f64, f64)> = refs.iter().map(|s| (s.loc.longitude(), s.loc.latitude())).collect();

    let mut levels: BTreeSet<usize> = geomspace_levels(min.max(1) as usize, n, num.max(1) as usize)
        .into_iter()
        .collect();
    levels.retain(|&k| k > 0 && k <= n);

    // Descending, per §4.3 step 4: finer-grained (larger k) levels first.
    for k in levels.into_iter().rev() {
        let labels = cluster_into_k(&points, k);
        let mut members_by_label: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
        for (i, label) in labels.into_iter().enumerate() {
            members_by_label.entry(label).or_default().push(i);
        }
        for members in members_by_label.values() {
            if let Some(representative) = pick_representative(&refs, members) {
                store
                    .append_cluster_level(&refs[representative].id, k as i64)
                    .await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geomspace_levels_matches_example_scenario() {
        // N=100, min=20, num=3 -> [20, 44, 100] (spec.md §8 scenario 6).
        let levels = geomspace_levels(20, 100, 3);
        assert_eq!(levels, vec![20, 44, 100]);
    }

    #[test]
    fn geomspace_levels_endpoints_are_min_and_n() {
        let levels = geomspace_levels(10, 1000, 5);
        assert_eq!(levels.first(), Some(&10));
        assert_eq!(levels.last(), Some(&1000));
    }
}
