//! Elevation sampling and peak detection.
//!
//! Grounded on `Provider.__compute_elevation` in `provider.py`: sample the
//! station plus six points on a 500 m circle around it, then flag the
//! station as a peak if the terrain drops away steeply in any direction.

use geo::{HaversineDestination, Point};
use serde::Deserialize;

use crate::errors::{EngineError, Result};
use crate::geo::GeoPoint;

const SAMPLE_RADIUS_METERS: f64 = 500.0;
const SAMPLE_BEARINGS_DEGREES: [f64; 6] = [0.0, 60.0, 120.0, 180.0, 240.0, 300.0];

/// The six points on a circle of [`SAMPLE_RADIUS_METERS`] around `center`,
/// 60 degrees apart.
pub fn sample_ring(center: &GeoPoint) -> Vec<GeoPoint> {
    let center_point = Point::new(center.longitude(), center.latitude());
    SAMPLE_BEARINGS_DEGREES
        .iter()
        .map(|bearing| {
            let sampled = center_point.haversine_destination(*bearing, SAMPLE_RADIUS_METERS);
            GeoPoint::new(sampled.y(), sampled.x()).unwrap_or(*center)
        })
        .collect()
}

/// True iff the terrain drops away steeply enough in some direction for
/// this to be considered a peak/ridge launch site: the glide ratio from
/// the center to a surrounding point is strictly between 0 and 6.
pub fn is_peak(center_elevation: f64, surrounding_elevations: &[f64]) -> bool {
    surrounding_elevations.iter().any(|&elev| {
        let drop = center_elevation - elev;
        if drop == 0.0 {
            return false;
        }
        let glide_ratio = SAMPLE_RADIUS_METERS / drop;
        glide_ratio > 0.0 && glide_ratio < 6.0
    })
}

#[derive(Debug, Deserialize)]
pub struct GoogleElevationResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GoogleElevationResult>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleElevationResult {
    pub elevation: f64,
}

/// Extract `(center_elevation, is_peak)` from a 7-point elevation response
/// (`[center, ring[0..6]]`, in that order, matching the request we sent).
pub fn interpret_elevation_response(response: &GoogleElevationResponse) -> Result<(f64, bool)> {
    if response.results.len() != 7 {
        return Err(EngineError::UpstreamError(format!(
            "expected 7 elevation samples, got {}",
            response.results.len()
        )));
    }
    let center = response.results[0].elevation;
    let surrounding: Vec<f64> = response.results[1..].iter().map(|r| r.elevation).collect();
    Ok((center, is_peak(center, &surrounding)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steep_drop_is_flagged_as_peak() {
        // 500 / (1000 - 900) = 5.0, within (0, 6).
        assert!(is_peak(1000.0, &[900.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0]));
    }

    #[test]
    fn gentle_slope_is_not_a_peak() {
        // 500 / (1000 - 950) = 10.0, outside (0, 6).
        assert!(!is_peak(1000.0, &[950.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0]));
    }

    #[test]
    fn rising_terrain_is_not_a_peak() {
        // drop is negative, ratio negative, outside (0, 6).
        assert!(!is_peak(1000.0, &[1100.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0]));
    }

    #[test]
    fn sample_ring_has_six_points_around_center() {
        let center = GeoPoint::new(46.5, 6.5).unwrap();
        let ring = sample_ring(&center);
        assert_eq!(ring.len(), 6);
        for point in &ring {
            let d = center.distance_meters(point);
            assert!((400.0..600.0).contains(&d), "got {d}");
        }
    }
}
