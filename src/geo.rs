//! Geographic point type, coordinate validation, and great-circle distance.
//!
//! Grounded on the GeoJSON-shaped `loc` field written by
//! `winds_mobi_provider/provider.py` (`{"type": "Point", "coordinates":
//! [lon, lat]}`) and on `admin_jobs/find_duplicates.py`'s pairwise distance
//! computation, ported from haversine-on-a-sphere to the `geo` crate's
//! `HaversineDistance`.

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};

/// A coordinate pair stored the way pymongo wrote it: GeoJSON `Point`,
/// longitude first. Field order in the derived (de)serialization matches
/// the stored document shape exactly.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: GeoPointKind,
    /// `[longitude, latitude]`, per GeoJSON.
    pub coordinates: [f64; 2],
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum GeoPointKind {
    Point,
}

impl GeoPoint {
    /// Build and validate a point from latitude/longitude in degrees.
    pub fn new(latitude: f64, longitude: f64) -> Result<GeoPoint> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(EngineError::InvalidInput(format!(
                "latitude {latitude} out of range [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(EngineError::InvalidInput(format!(
                "longitude {longitude} out of range [-180, 180]"
            )));
        }
        Ok(GeoPoint {
            kind: GeoPointKind::Point,
            coordinates: [longitude, latitude],
        })
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    fn as_geo_point(&self) -> Point<f64> {
        Point::new(self.longitude(), self.latitude())
    }

    /// Great-circle distance to `other`, in meters.
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        self.as_geo_point().haversine_distance(&other.as_geo_point())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_latitude() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(-91.0, 0.0).is_err());
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        assert!(GeoPoint::new(0.0, 181.0).is_err());
        assert!(GeoPoint::new(0.0, -181.0).is_err());
    }

    #[test]
    fn accepts_boundary_values() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn coordinates_are_lon_lat_order() {
        let p = GeoPoint::new(46.5, 6.5).unwrap();
        assert_eq!(p.coordinates, [6.5, 46.5]);
        assert_eq!(p.latitude(), 46.5);
        assert_eq!(p.longitude(), 6.5);
    }

    #[test]
    fn distance_between_same_point_is_zero() {
        let p = GeoPoint::new(46.5, 6.5).unwrap();
        assert_eq!(p.distance_meters(&p), 0.0);
    }

    #[test]
    fn distance_matches_known_scale() {
        // Geneva to Zurich is roughly 225 km.
        let geneva = GeoPoint::new(46.2044, 6.1432).unwrap();
        let zurich = GeoPoint::new(47.3769, 8.5417).unwrap();
        let d_km = geneva.distance_meters(&zurich) / 1000.0;
        assert!((200.0..250.0).contains(&d_km), "got {d_km} km");
    }
}
