use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::BookingError;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    /// Builds `[start, start + hours)`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `hours` is negative, not finite, or
    /// pushes the end past the representable date range.
    pub fn from_hours(start: NaiveDateTime, hours: f64) -> Result<Self, BookingError> {
        if !hours.is_finite() || hours < 0.0 {
            return Err(BookingError::validation(format!(
                "duration must be a non-negative number of hours, got {}",
                hours
            )));
        }

        let millis = (hours * MILLIS_PER_HOUR).round();
        if millis >= i64::MAX as f64 {
            return Err(BookingError::validation("duration is too long"));
        }

        let end = start
            .checked_add_signed(Duration::milliseconds(millis as i64))
            .ok_or_else(|| BookingError::validation("duration is too long"))?;

        Ok(Interval { start, end })
    }

    /// A zero-length window occupies no instant.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True iff the two windows share at least one instant.
    pub fn overlaps(&self, other: &Interval) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        !(self.end <= other.start || self.start >= other.end)
    }
}

/// Returns true if `candidate` overlaps any interval in `existing`.
pub fn has_overlap(candidate: &Interval, existing: &[Interval]) -> bool {
    existing.iter().any(|interval| candidate.overlaps(interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn window(hour: u32, hours: f64) -> Interval {
        Interval::from_hours(at(hour, 0), hours).unwrap()
    }

    #[test]
    fn test_contained_window_overlaps() {
        // [10:00, 12:00) vs [11:00, 12:00)
        assert!(has_overlap(&window(11, 1.0), &[window(10, 2.0)]));
    }

    #[test]
    fn test_touching_boundary_does_not_overlap() {
        // [10:00, 12:00) vs [12:00, 13:00)
        assert!(!has_overlap(&window(12, 1.0), &[window(10, 2.0)]));
        assert!(!has_overlap(&window(10, 2.0), &[window(12, 1.0)]));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let windows = [
            window(8, 1.0),
            window(9, 3.0),
            window(10, 0.5),
            window(11, 2.0),
            window(12, 0.0),
            Interval::from_hours(at(10, 15), 0.25).unwrap(),
        ];
        for a in &windows {
            for b in &windows {
                assert_eq!(
                    has_overlap(a, std::slice::from_ref(b)),
                    has_overlap(b, std::slice::from_ref(a)),
                    "{a:?} vs {b:?}"
                );
            }
        }
    }

    #[test]
    fn test_window_overlaps_itself() {
        let a = window(9, 1.5);
        assert!(has_overlap(&a, &[a]));
    }

    #[test]
    fn test_zero_duration_never_overlaps() {
        let point = window(11, 0.0);
        assert!(point.is_empty());
        assert!(!has_overlap(&point, &[window(10, 2.0)]));
        assert!(!has_overlap(&window(10, 2.0), &[point]));
        assert!(!has_overlap(&point, &[point]));
    }

    #[test]
    fn test_any_match_in_existing_set() {
        let existing = [window(6, 1.0), window(14, 1.0), window(20, 2.0)];
        assert!(has_overlap(&window(21, 1.0), &existing));
        assert!(!has_overlap(&window(8, 4.0), &existing));
        assert!(!has_overlap(&window(8, 4.0), &[]));
    }

    #[test]
    fn test_fractional_hours() {
        let interval = Interval::from_hours(at(10, 0), 1.5).unwrap();
        assert_eq!(interval.end, at(11, 30));
    }

    #[test]
    fn test_rejects_invalid_durations() {
        assert!(Interval::from_hours(at(10, 0), -1.0).is_err());
        assert!(Interval::from_hours(at(10, 0), f64::NAN).is_err());
        assert!(Interval::from_hours(at(10, 0), f64::INFINITY).is_err());
        assert!(Interval::from_hours(at(10, 0), 1e300).is_err());
    }
}
