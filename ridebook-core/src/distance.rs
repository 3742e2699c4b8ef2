use crate::booking::validation::ensure_non_negative;
use crate::error::BookingError;

/// Mean Earth radius in kilometers (IUGG).
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Distance lookup between two location descriptors.
///
/// Presentation layers consult it when a caller gives no explicit
/// distance; the booking engine always receives a concrete number.
pub trait DistanceProvider: Send + Sync {
    fn distance_km(&self, pickup: &str, destination: &str) -> Result<f64, BookingError>;
}

/// Great-circle distance between `lat,lng` descriptors.
///
/// Free-text descriptors have no coordinates to measure, so they fall
/// back to a configured flat distance.
#[derive(Debug, Clone, Copy)]
pub struct GeodesicDistance {
    fallback_km: f64,
}

impl GeodesicDistance {
    pub fn new(fallback_km: f64) -> Self {
        Self { fallback_km }
    }
}

impl DistanceProvider for GeodesicDistance {
    fn distance_km(&self, pickup: &str, destination: &str) -> Result<f64, BookingError> {
        match (parse_coordinates(pickup)?, parse_coordinates(destination)?) {
            (Some(from), Some(to)) => Ok(haversine_km(from, to)),
            _ => Ok(self.fallback_km),
        }
    }
}

/// Resolves the distance for a booking: an explicit value wins, otherwise
/// the provider measures the descriptors.
pub fn resolve_distance(
    provider: &dyn DistanceProvider,
    pickup: &str,
    destination: &str,
    explicit_km: Option<f64>,
) -> Result<f64, BookingError> {
    match explicit_km {
        Some(km) => ensure_non_negative("distance_km", km),
        None => provider.distance_km(pickup, destination),
    }
}

/// Parses `lat,lng` or `(lat, lng)`.
///
/// Returns `Ok(None)` for descriptors that are not a coordinate pair and
/// an error for a pair outside the valid latitude/longitude range.
pub fn parse_coordinates(descriptor: &str) -> Result<Option<(f64, f64)>, BookingError> {
    let inner = descriptor
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');

    let mut parts = inner.split(',');
    let (Some(lat), Some(lng), None) = (parts.next(), parts.next(), parts.next()) else {
        return Ok(None);
    };
    let (Ok(lat), Ok(lng)) = (lat.trim().parse::<f64>(), lng.trim().parse::<f64>()) else {
        return Ok(None);
    };

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(BookingError::validation(format!(
            "coordinates ({}, {}) are out of range",
            lat, lng
        )));
    }
    Ok(Some((lat, lng)))
}

fn haversine_km((lat1, lng1): (f64, f64), (lat2, lng2): (f64, f64)) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_both_descriptor_styles() {
        assert_eq!(
            parse_coordinates("27.7172,85.3240").unwrap(),
            Some((27.7172, 85.3240))
        );
        assert_eq!(
            parse_coordinates("(27.6710, 85.4298)").unwrap(),
            Some((27.6710, 85.4298))
        );
        assert_eq!(parse_coordinates("Kathmandu").unwrap(), None);
        assert_eq!(parse_coordinates("Patan, Lalitpur").unwrap(), None);
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        assert!(parse_coordinates("95.0, 10.0").is_err());
        assert!(parse_coordinates("10.0, -181.0").is_err());
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let km = haversine_km((0.0, 0.0), (1.0, 0.0));
        assert!((km - 111.195).abs() < 0.01, "{km}");
    }

    #[test]
    fn test_free_text_falls_back() {
        let provider = GeodesicDistance::new(10.0);
        assert_eq!(provider.distance_km("Kathmandu", "Patan").unwrap(), 10.0);
        assert_eq!(provider.distance_km("Kathmandu", "27.6,85.3").unwrap(), 10.0);
        assert_eq!(provider.distance_km("27.6,85.3", "27.6,85.3").unwrap(), 0.0);
    }

    #[test]
    fn test_explicit_distance_wins() {
        let provider = GeodesicDistance::new(10.0);
        assert_eq!(
            resolve_distance(&provider, "0,0", "1,0", Some(3.5)).unwrap(),
            3.5
        );
        assert!(resolve_distance(&provider, "a", "b", Some(-1.0)).is_err());
        assert_eq!(resolve_distance(&provider, "a", "b", None).unwrap(), 10.0);
    }
}
