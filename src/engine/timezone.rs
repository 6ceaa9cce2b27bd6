//! Offline IANA timezone lookup from a coordinate.
//!
//! The original implementation called out to `timezonefinder`'s precomputed
//! shapefile data; we use `tzf-rs`'s bundled, compressed lookup tables so
//! the same "no network call" property holds without shipping our own
//! shapefiles.

use tzf_rs::DefaultFinder;

/// Look up the IANA timezone id for a coordinate. Falls back to `"UTC"`
/// for points the lookup table has no polygon for (open ocean).
pub fn lookup_timezone(finder: &DefaultFinder, latitude: f64, longitude: f64) -> String {
    let name = finder.get_tz_name(longitude, latitude);
    if name.is_empty() {
        "UTC".to_owned()
    } else {
        name.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_known_timezone() {
        let finder = DefaultFinder::new();
        let tz = lookup_timezone(&finder, 46.5, 6.5);
        assert!(!tz.is_empty());
    }
}
