//! Reverse-geocoding: calling Google's geocoding API and parsing the
//! station names and country code out of its response.
//!
//! Grounded on `Provider.__parse_reverse_geocoding_results` in
//! `provider.py`, which walks `results[].address_components[]` in a fixed
//! priority order looking for the first usable place name.

use serde::{Deserialize, Serialize};

/// Priority order for picking a result's place name, highest first.
const NAME_COMPONENT_PRIORITY: &[&str] = &[
    "airport",
    "locality",
    "colloquial_area",
    "natural_feature",
    "point_of_interest",
    "neighborhood",
    "sublocality",
    "administrative_area_level_3",
];

#[derive(Debug, Deserialize)]
pub struct GoogleGeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GoogleGeocodeResult>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleGeocodeResult {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

/// The station name candidate recovered from reverse geocoding, handed to
/// the adapter's naming function for final blending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocodedNames {
    pub short: Option<String>,
    pub long: Option<String>,
    pub country_code: Option<String>,
}

/// Scan `response.results` in priority order and return the first matching
/// address component's short/long name, plus the country code found
/// anywhere in the response.
pub fn parse_geocoded_names(response: &GoogleGeocodeResponse) -> GeocodedNames {
    let mut names = GeocodedNames::default();

    'priority: for wanted_type in NAME_COMPONENT_PRIORITY {
        for result in &response.results {
            if !result.types.iter().any(|t| t == wanted_type) {
                continue;
            }
            if let Some(component) = result
                .address_components
                .iter()
                .find(|c| c.types.iter().any(|t| t == wanted_type))
            {
                names.short = Some(component.short_name.clone());
                names.long = Some(component.long_name.clone());
                break 'priority;
            }
        }
    }

    'country: for result in &response.results {
        if let Some(component) = result
            .address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == "country"))
        {
            names.country_code = Some(component.short_name.clone());
            break 'country;
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(long: &str, short: &str, types: &[&str]) -> AddressComponent {
        AddressComponent {
            long_name: long.to_owned(),
            short_name: short.to_owned(),
            types: types.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn picks_highest_priority_component() {
        let response = GoogleGeocodeResponse {
            status: "OK".to_owned(),
            error_message: None,
            results: vec![
                GoogleGeocodeResult {
                    types: vec!["sublocality".to_owned()],
                    address_components: vec![component("Sublocality Name", "Sub", &["sublocality"])],
                },
                GoogleGeocodeResult {
                    types: vec!["locality".to_owned(), "country".to_owned()],
                    address_components: vec![
                        component("Locality Name", "Loc", &["locality"]),
                        component("Switzerland", "CH", &["country"]),
                    ],
                },
            ],
        };

        let names = parse_geocoded_names(&response);
        assert_eq!(names.short.as_deref(), Some("Loc"));
        assert_eq!(names.long.as_deref(), Some("Locality Name"));
        assert_eq!(names.country_code.as_deref(), Some("CH"));
    }

    #[test]
    fn empty_results_yield_no_names() {
        let response = GoogleGeocodeResponse {
            status: "ZERO_RESULTS".to_owned(),
            error_message: None,
            results: vec![],
        };
        let names = parse_geocoded_names(&response);
        assert!(names.short.is_none());
        assert!(names.long.is_none());
        assert!(names.country_code.is_none());
    }
}
