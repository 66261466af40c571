//! Unit conversions used when presenting telemetry.

/// Feet per metre.
const FEET_PER_METRE: f64 = 3.280_84;

/// Pascals per pound per square inch.
const PASCALS_PER_PSI: f64 = 6_894.757;

/// Converts metres to feet.
#[must_use]
pub fn metres_to_feet(metres: f64) -> f64 {
    metres * FEET_PER_METRE
}

/// Converts thousandths of a degree Celsius to degrees Celsius.
#[must_use]
pub fn milli_degrees_to_celsius(milli_degrees: i32) -> f64 {
    f64::from(milli_degrees) / 1000.0
}

/// Converts degrees Celsius to degrees Fahrenheit.
#[must_use]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Converts pascals to pounds per square inch.
#[must_use]
pub fn pascals_to_psi(pascals: u32) -> f64 {
    f64::from(pascals) / PASCALS_PER_PSI
}

/// Rounds to the given number of decimal places.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metres_to_feet() {
        assert!((metres_to_feet(1000.0) - 3280.84).abs() < 1e-6);
    }

    #[test]
    fn test_temperatures() {
        assert!((milli_degrees_to_celsius(21_500) - 21.5).abs() < 1e-9);
        assert!((milli_degrees_to_celsius(-4_000) + 4.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(-40.0) + 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_pascals_to_psi() {
        assert!((pascals_to_psi(101_325) - 14.696).abs() < 1e-3);
    }

    #[test]
    fn test_round_to() {
        assert!((round_to(1.23456, 2) - 1.23).abs() < 1e-12);
        assert!((round_to(2.46, 1) - 2.5).abs() < 1e-12);
    }
}
