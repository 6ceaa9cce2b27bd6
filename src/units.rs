//! Typed physical quantities, unit conversion, rounding, and pressure
//! derivation.
//!
//! Grounded on `winds_mobi_provider/provider.py`'s `__to_wind_speed` /
//! `__to_temperature` / `__to_pressure` / `__to_altitude` / `__to_rain`
//! helpers (which dispatch dynamically on whether the caller passed a
//! `pint` quantity or a bare number) and `TWxUtils`'s altimeter/sea-level
//! pressure formulae (see `tests/pressure_test.py` for the oracle values
//! this module's `qfe_qnh` round-trip is checked against).
//!
//! Per the REDESIGN FLAGS in spec.md §9, the "callable or bare number"
//! dynamic dispatch becomes a plain tagged union: [`Measured`].

/// Either a bare number already in our canonical unit, or a number tagged
/// with the unit it was measured in. The engine normalises both to the
/// canonical unit for its physical quantity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Measured<U> {
    /// A bare number, assumed to already be in the canonical unit.
    Raw(f64),
    /// A number paired with the unit it was measured in.
    Quantity(f64, U),
}

impl<U> Measured<U> {
    pub fn raw(value: f64) -> Self {
        Measured::Raw(value)
    }

    pub fn with_unit(value: f64, unit: U) -> Self {
        Measured::Quantity(value, unit)
    }
}

impl<U> From<f64> for Measured<U> {
    fn from(value: f64) -> Self {
        Measured::Raw(value)
    }
}

/// Units a wind speed may arrive in. Canonical unit: km/h.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindSpeedUnit {
    KilometersPerHour,
    MetersPerSecond,
    Knots,
    MilesPerHour,
}

impl WindSpeedUnit {
    fn to_km_h(self, value: f64) -> f64 {
        match self {
            WindSpeedUnit::KilometersPerHour => value,
            WindSpeedUnit::MetersPerSecond => value * 3.6,
            WindSpeedUnit::Knots => value * 1.852,
            WindSpeedUnit::MilesPerHour => value * 1.609_344,
        }
    }
}

/// Units a temperature may arrive in. Canonical unit: degrees Celsius.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    fn to_celsius(self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => value,
            TemperatureUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            TemperatureUnit::Kelvin => value - 273.15,
        }
    }
}

/// Units a pressure may arrive in. Canonical unit: hPa.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PressureUnit {
    Hectopascal,
    Millibar,
    InchesOfMercury,
}

impl PressureUnit {
    fn to_hpa(self, value: f64) -> f64 {
        match self {
            PressureUnit::Hectopascal | PressureUnit::Millibar => value,
            PressureUnit::InchesOfMercury => value * 33.863_9,
        }
    }
}

/// Units an altitude may arrive in. Canonical unit: meters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AltitudeUnit {
    Meters,
    Feet,
}

impl AltitudeUnit {
    fn to_meters(self, value: f64) -> f64 {
        match self {
            AltitudeUnit::Meters => value,
            AltitudeUnit::Feet => value * 0.3048,
        }
    }
}

/// Units rain accumulation may arrive in. Canonical unit: mm (== liter/m^2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RainUnit {
    Millimeters,
    Inches,
}

impl RainUnit {
    fn to_mm(self, value: f64) -> f64 {
        match self {
            RainUnit::Millimeters => value,
            RainUnit::Inches => value * 25.4,
        }
    }
}

impl Measured<WindSpeedUnit> {
    pub fn to_km_h(self) -> f64 {
        match self {
            Measured::Raw(v) => v,
            Measured::Quantity(v, u) => u.to_km_h(v),
        }
    }
}

impl Measured<TemperatureUnit> {
    pub fn to_celsius(self) -> f64 {
        match self {
            Measured::Raw(v) => v,
            Measured::Quantity(v, u) => u.to_celsius(v),
        }
    }
}

impl Measured<PressureUnit> {
    pub fn to_hpa(self) -> f64 {
        match self {
            Measured::Raw(v) => v,
            Measured::Quantity(v, u) => u.to_hpa(v),
        }
    }
}

impl Measured<AltitudeUnit> {
    pub fn to_meters(self) -> f64 {
        match self {
            Measured::Raw(v) => v,
            Measured::Quantity(v, u) => u.to_meters(v),
        }
    }
}

impl Measured<RainUnit> {
    pub fn to_mm(self) -> f64 {
        match self {
            Measured::Raw(v) => v,
            Measured::Quantity(v, u) => u.to_mm(v),
        }
    }
}

/// Round `value` to `ndigits` decimal places, or fall back to `0.0` (not
/// `None`) when `mandatory` and the value isn't finite. Mirrors
/// `to_float(value, ndigits, mandatory)` in `provider.py`.
pub fn round_float(value: f64, ndigits: i32, mandatory: bool) -> Option<f64> {
    if value.is_finite() {
        let factor = 10f64.powi(ndigits);
        Some((value * factor).round() / factor)
    } else if mandatory {
        Some(0.0)
    } else {
        None
    }
}

/// Round `value` to the nearest integer, or fall back to `0` (not `None`)
/// when `mandatory` and the value isn't finite. Mirrors `to_int`.
pub fn round_int(value: f64, mandatory: bool) -> Option<i64> {
    if value.is_finite() {
        Some(value.round() as i64)
    } else if mandatory {
        Some(0)
    } else {
        None
    }
}

/// Wrap a wind direction in degrees into `[0, 360)`.
pub fn wrap_degrees(degrees: i64) -> i64 {
    degrees.rem_euclid(360)
}

// --- Pressure derivation -----------------------------------------------
//
// QFE <-> QNH ports TWxUtils's "aaMADIS" altimeter-setting algorithm
// (temperature-independent, exact algebraic inverses of one another). QFE
// <-> QFF additionally accounts for the actual station temperature and
// humidity via the virtual temperature of the air column between the
// station and sea level.

/// hPa per inch of mercury, inverse of [`PressureUnit::InchesOfMercury`]'s
/// conversion factor.
const INHG_PER_HPA: f64 = 1.0 / 33.863_9;
/// Feet per meter.
const FEET_PER_METER: f64 = 1.0 / 0.3048;
/// aaMADIS altimeter exponent.
const MADIS_EXPONENT: f64 = 0.190_284;
/// aaMADIS altimeter elevation coefficient, per foot.
const MADIS_K1: f64 = 1.334_43e-5;
/// aaMADIS altimeter offset, inHg. TWxUtils subtracts this before raising
/// station pressure to [`MADIS_EXPONENT`] and adds it back after.
const MADIS_OFFSET_INHG: f64 = 0.3;
/// Standard gravity, m/s^2.
const G: f64 = 9.806_65;
/// Specific gas constant for dry air, J/(kg*K).
const R_DRY_AIR: f64 = 287.058;
/// ISA temperature lapse rate, K/m, used by the QFE<->QFF virtual
/// temperature correction.
const ISA_LAPSE: f64 = 0.0065;

/// Altimeter setting (QNH) from station pressure (QFE), TWxUtils's aaMADIS
/// algorithm.
pub fn qfe_to_qnh(qfe_hpa: f64, altitude_m: f64) -> f64 {
    let sp = qfe_hpa * INHG_PER_HPA;
    let z_ft = altitude_m * FEET_PER_METER;
    let ap = ((sp - MADIS_OFFSET_INHG).powf(MADIS_EXPONENT) + MADIS_K1 * z_ft)
        .powf(1.0 / MADIS_EXPONENT)
        + MADIS_OFFSET_INHG;
    ap / INHG_PER_HPA
}

/// Station pressure (QFE) from altimeter setting (QNH); exact inverse of
/// [`qfe_to_qnh`].
pub fn qnh_to_qfe(qnh_hpa: f64, altitude_m: f64) -> f64 {
    let ap = qnh_hpa * INHG_PER_HPA;
    let z_ft = altitude_m * FEET_PER_METER;
    let sp = ((ap - MADIS_OFFSET_INHG).powf(MADIS_EXPONENT) - MADIS_K1 * z_ft)
        .powf(1.0 / MADIS_EXPONENT)
        + MADIS_OFFSET_INHG;
    sp / INHG_PER_HPA
}

/// Saturation vapor pressure at `temp_c`, hPa (Magnus-Tetens approximation).
fn saturation_vapor_pressure_hpa(temp_c: f64) -> f64 {
    6.1078 * 10f64.powf(7.5 * temp_c / (237.3 + temp_c))
}

/// Virtual temperature of the air column, averaged between the station and
/// sea level using the standard lapse rate, corrected for humidity.
fn mean_column_virtual_temperature_k(
    altitude_m: f64,
    temp_c: f64,
    humidity_pct: f64,
    pressure_hpa: f64,
) -> f64 {
    let t_k = temp_c + 273.15;
    let es = saturation_vapor_pressure_hpa(temp_c);
    let e = es * (humidity_pct / 100.0);
    let tv = t_k / (1.0 - 0.378 * (e / pressure_hpa));
    tv + ISA_LAPSE * altitude_m / 2.0
}

/// Sea-level pressure (QFF) from station pressure (QFE), using current
/// temperature and humidity for the sea-level reduction.
pub fn qfe_to_qff(qfe_hpa: f64, altitude_m: f64, temp_c: f64, humidity_pct: f64) -> f64 {
    let tm = mean_column_virtual_temperature_k(altitude_m, temp_c, humidity_pct, qfe_hpa);
    qfe_hpa * ((G * altitude_m) / (R_DRY_AIR * tm)).exp()
}

/// Station pressure (QFE) from sea-level pressure (QFF); approximate
/// inverse of [`qfe_to_qff`] (the air-column virtual temperature is
/// recomputed from the QFF side, which differs negligibly from the QFE
/// side for realistic humidity).
pub fn qff_to_qfe(qff_hpa: f64, altitude_m: f64, temp_c: f64, humidity_pct: f64) -> f64 {
    let tm = mean_column_virtual_temperature_k(altitude_m, temp_c, humidity_pct, qff_hpa);
    qff_hpa * (-(G * altitude_m) / (R_DRY_AIR * tm)).exp()
}

/// The three pressure readings a measurement may carry, any subset
/// present. Canonical unit: hPa, rounded to 4dp.
#[derive(Clone, Copy, Debug, Default)]
pub struct PressureTriplet {
    pub qfe: Option<f64>,
    pub qnh: Option<f64>,
    pub qff: Option<f64>,
}

impl PressureTriplet {
    pub fn is_empty(&self) -> bool {
        self.qfe.is_none() && self.qnh.is_none() && self.qff.is_none()
    }

    /// Fill in missing pressure fields using `altitude_m` and, when
    /// available, `temperature_c`/`humidity_pct`. Mirrors
    /// `Provider.__compute_pressures`.
    pub fn complete(
        mut self,
        altitude_m: f64,
        temperature_c: Option<f64>,
        humidity_pct: Option<f64>,
    ) -> PressureTriplet {
        if let (Some(qfe), None) = (self.qfe, self.qnh) {
            self.qnh = Some(round4(qfe_to_qnh(qfe, altitude_m)));
        }
        if let (Some(qnh), None) = (self.qnh, self.qfe) {
            self.qfe = Some(round4(qnh_to_qfe(qnh, altitude_m)));
        }
        if let (Some(qfe), None, Some(t), Some(h)) = (self.qfe, self.qff, temperature_c, humidity_pct)
        {
            self.qff = Some(round4(qfe_to_qff(qfe, altitude_m, t, h)));
        }
        if let (Some(qff), None, Some(t), Some(h)) = (self.qff, self.qfe, temperature_c, humidity_pct)
        {
            self.qfe = Some(round4(qff_to_qfe(qff, altitude_m, t, h)));
        }
        self
    }
}

fn round4(value: f64) -> f64 {
    round_float(value, 4, true).unwrap_or(0.0)
}
