//! Quantified invariants from spec.md §8: pressure round-trips agree within
//! 0.1 hPa and wind-speed normalisation agrees within 0.1 km/h, exercised
//! through the public `units` API rather than `units.rs`'s own internal
//! unit tests.

use winds_mobi_ingest::units::{
    qfe_to_qff, qfe_to_qnh, qff_to_qfe, qnh_to_qfe, Measured, PressureTriplet, WindSpeedUnit,
};

#[test]
fn pressure_triplet_completes_qnh_and_qff_from_qfe_alone() {
    for altitude in [0.0, 500.0, 1500.0, 3000.0] {
        for temp in [-30.0, 0.0, 15.0, 30.0] {
            let triplet = PressureTriplet { qfe: Some(950.0), qnh: None, qff: None }
                .complete(altitude, Some(temp), Some(60.0));
            let qnh = triplet.qnh.expect("qnh should be derived from qfe");
            let qff = triplet.qff.expect("qff should be derived from qfe");

            let back_from_qnh = qnh_to_qfe(qnh, altitude);
            assert!(
                (back_from_qnh - 950.0).abs() < 0.1,
                "altitude {altitude} temp {temp}: qfe->qnh->qfe got {back_from_qnh}"
            );

            let back_from_qff = qff_to_qfe(qff, altitude, temp, 60.0);
            assert!(
                (back_from_qff - 950.0).abs() < 0.1,
                "altitude {altitude} temp {temp}: qfe->qff->qfe got {back_from_qff}"
            );
        }
    }
}

#[test]
fn pressure_triplet_completes_qfe_from_qnh_alone() {
    for altitude in [0.0, 500.0, 1500.0, 3000.0] {
        let triplet =
            PressureTriplet { qfe: None, qnh: Some(1013.0), qff: None }.complete(altitude, None, None);
        let qfe = triplet.qfe.expect("qfe should be derived from qnh");
        let back = qfe_to_qnh(qfe, altitude);
        assert!((back - 1013.0).abs() < 0.1, "altitude {altitude}: qnh->qfe->qnh got {back}");
    }
}

#[test]
fn pressure_triplet_leaves_qff_absent_without_temperature_or_humidity() {
    let triplet =
        PressureTriplet { qfe: Some(950.0), qnh: None, qff: None }.complete(500.0, None, None);
    assert!(triplet.qnh.is_some());
    assert!(triplet.qff.is_none(), "qff needs temperature and humidity to derive");
}

#[test]
fn wind_speed_normalises_to_km_h_within_tolerance() {
    let cases = [
        (WindSpeedUnit::MetersPerSecond, 3.0, 10.8),
        (WindSpeedUnit::Knots, 10.0, 18.52),
        (WindSpeedUnit::KilometersPerHour, 42.0, 42.0),
    ];
    for (unit, input, expected_km_h) in cases {
        let got = Measured::with_unit(input, unit).to_km_h();
        assert!((got - expected_km_h).abs() < 0.1, "{unit:?}({input}): got {got}, expected {expected_km_h}");
    }
}

#[test]
fn raw_wind_speed_passes_through_unchanged() {
    let got = Measured::<WindSpeedUnit>::raw(27.3).to_km_h();
    assert_eq!(got, 27.3);
}

#[test]
fn qfe_qff_round_trip_tracks_humidity_too() {
    for humidity in [10.0, 50.0, 95.0] {
        let qfe = 950.0;
        let qff = qfe_to_qff(qfe, 1500.0, 20.0, humidity);
        let back = qff_to_qfe(qff, 1500.0, 20.0, humidity);
        assert!((back - qfe).abs() < 0.1, "humidity {humidity}: got {back}");
    }
}
