use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BookingError;

/// Flat fee charged on every ride.
pub const BASE_FARE: Decimal = Decimal::from_parts(25, 0, 0, false, 0);

/// Charge per meter travelled (50.00 per km).
pub const RATE_PER_METER: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Charge per hour the driver is committed.
pub const WAITING_RATE_PER_HOUR: Decimal = Decimal::from_parts(200, 0, 0, false, 0);

const METERS_PER_KM: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Result of a fare computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fare {
    /// base fare + distance cost
    pub base_cost: Decimal,

    /// base cost + waiting cost + tip
    pub total_cost: Decimal,
}

/// Computes the fare for a ride.
///
/// ```text
/// base_cost  = 25 + distance_km * 1000 * 0.05
/// total_cost = base_cost + duration_hours * 200 + tip
/// ```
///
/// Inputs must be finite and non-negative; the booking engine rejects
/// anything else before calling this.
///
/// # Errors
///
/// `Validation` when an input or an intermediate amount does not fit in
/// a `Decimal`.
pub fn compute_fare(
    distance_km: f64,
    duration_hours: f64,
    tip: Decimal,
) -> Result<Fare, BookingError> {
    let distance = to_decimal("distance_km", distance_km)?;
    let duration = to_decimal("duration_hours", duration_hours)?;

    let base_cost = distance
        .checked_mul(METERS_PER_KM)
        .and_then(|meters| meters.checked_mul(RATE_PER_METER))
        .and_then(|distance_cost| distance_cost.checked_add(BASE_FARE))
        .ok_or_else(|| too_large("distance_km"))?;
    let waiting_cost = duration
        .checked_mul(WAITING_RATE_PER_HOUR)
        .ok_or_else(|| too_large("duration_hours"))?;
    let total_cost = base_cost
        .checked_add(waiting_cost)
        .and_then(|subtotal| subtotal.checked_add(tip))
        .ok_or_else(|| too_large("total_cost"))?;

    Ok(Fare {
        base_cost: base_cost.normalize(),
        total_cost: total_cost.normalize(),
    })
}

fn to_decimal(field: &str, value: f64) -> Result<Decimal, BookingError> {
    Decimal::from_f64(value).ok_or_else(|| too_large(field))
}

fn too_large(field: &str) -> BookingError {
    BookingError::validation(format!("{} is too large to price", field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::ToPrimitive;

    #[test]
    fn test_reference_ride_fare() {
        let fare = compute_fare(10.0, 2.0, Decimal::from(50)).unwrap();
        assert_eq!(fare.base_cost, Decimal::from(525));
        assert_eq!(fare.total_cost, Decimal::from(975));
    }

    #[test]
    fn test_zero_ride_costs_base_fare() {
        let fare = compute_fare(0.0, 0.0, Decimal::ZERO).unwrap();
        assert_eq!(fare.base_cost, BASE_FARE);
        assert_eq!(fare.total_cost, BASE_FARE);
    }

    #[test]
    fn test_fare_matches_formula_over_grid() {
        let distances = [0.0, 0.5, 1.25, 8.0, 15.0, 42.195];
        let durations = [0.0, 0.25, 1.5, 3.0];
        let tips = [0.0, 10.0, 50.5];

        for &d in &distances {
            for &h in &durations {
                for &t in &tips {
                    let fare = compute_fare(d, h, Decimal::from_f64(t).unwrap()).unwrap();
                    let expected_base = 25.0 + d * 1000.0 * 0.05;
                    let expected_total = expected_base + h * 200.0 + t;
                    let base = fare.base_cost.to_f64().unwrap();
                    let total = fare.total_cost.to_f64().unwrap();
                    assert!((base - expected_base).abs() < 1e-9, "base for d={d}");
                    assert!(
                        (total - expected_total).abs() < 1e-9,
                        "total for d={d} h={h} t={t}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_oversized_inputs_are_rejected() {
        // Representable, but the distance cost overflows.
        assert!(matches!(
            compute_fare(1e27, 0.0, Decimal::ZERO),
            Err(BookingError::Validation(_))
        ));
        // Not representable as a Decimal at all.
        assert!(matches!(
            compute_fare(1e30, 0.0, Decimal::ZERO),
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            compute_fare(0.0, 1e27, Decimal::ZERO),
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            compute_fare(10.0, 2.0, Decimal::MAX),
            Err(BookingError::Validation(_))
        ));
    }

    #[test]
    fn test_large_but_representable_distance_is_exact() {
        let fare = compute_fare(1e20, 0.0, Decimal::ZERO).unwrap();
        let expected = Decimal::from_f64(1e20).unwrap() * Decimal::from(50) + BASE_FARE;
        assert_eq!(fare.base_cost, expected);
    }

    #[test]
    fn test_rate_constants() {
        assert_eq!(RATE_PER_METER * METERS_PER_KM, Decimal::from(50));
        assert_eq!(WAITING_RATE_PER_HOUR, Decimal::from(200));
    }
}
