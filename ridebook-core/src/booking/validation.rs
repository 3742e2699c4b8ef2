use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::error::BookingError;

/// Canonical pickup format, as typed into the booking forms.
pub const PICKUP_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

const ACCEPTED_FORMATS: [&str; 4] = [
    PICKUP_TIME_FORMAT,
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parses a pickup timestamp.
///
/// Any failure is a validation error; callers must not treat an
/// unparseable time as "no conflict".
pub fn parse_pickup_time(input: &str) -> Result<NaiveDateTime, BookingError> {
    let trimmed = input.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| {
            BookingError::validation(format!(
                "invalid pickup time '{}', expected YYYY-MM-DD HH:MM",
                input
            ))
        })
}

/// Rejects pickup times strictly before `now`.
pub fn ensure_not_in_past(
    pickup_time: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<(), BookingError> {
    if pickup_time < now {
        return Err(BookingError::validation(format!(
            "pickup time {} is in the past",
            pickup_time.format(PICKUP_TIME_FORMAT)
        )));
    }
    Ok(())
}

/// Rejects negative, NaN and infinite quantities.
pub fn ensure_non_negative(field: &str, value: f64) -> Result<f64, BookingError> {
    if !value.is_finite() || value < 0.0 {
        return Err(BookingError::validation(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )));
    }
    Ok(value)
}

pub fn ensure_non_negative_amount(field: &str, value: Decimal) -> Result<Decimal, BookingError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(BookingError::validation(format!(
            "{} must not be negative, got {}",
            field, value
        )));
    }
    Ok(value)
}

pub fn ensure_present(field: &str, value: &str) -> Result<(), BookingError> {
    if value.trim().is_empty() {
        return Err(BookingError::validation(format!("{} is required", field)));
    }
    Ok(())
}
