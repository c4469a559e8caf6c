use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// WGS84 coordinate pair. Wire names match the public API
/// (`{"latitude": .., "longitude": ..}`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn validate(&self) -> Result<(), DispatchError> {
        let valid = self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude);

        if valid {
            Ok(())
        } else {
            Err(DispatchError::InvalidCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// Great-circle distance between two points in kilometers, haversine formula,
/// rounded to two decimals. Symmetric; zero for identical points.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> Result<f64, DispatchError> {
    a.validate()?;
    b.validate()?;

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lon = (delta_lon / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lon * sin_lon;
    let central_angle = 2.0 * haversine.sqrt().asin();

    Ok(round2(EARTH_RADIUS_KM * central_angle))
}

/// Minutes needed to cover the distance from `a` to `b` at `speed_kmh`,
/// rounded up to whole minutes.
pub fn eta_minutes(a: &GeoPoint, b: &GeoPoint, speed_kmh: f64) -> Result<u64, DispatchError> {
    if !speed_kmh.is_finite() || speed_kmh <= 0.0 {
        return Err(DispatchError::InvalidSpeed(speed_kmh));
    }

    let distance = distance_km(a, b)?;
    Ok((distance / speed_kmh * 60.0).ceil() as u64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{distance_km, eta_minutes, GeoPoint};
    use crate::error::DispatchError;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint {
            latitude,
            longitude,
        }
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = point(12.9716, 77.5946);
        assert_eq!(distance_km(&p, &p).unwrap(), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = point(12.90, 77.58);
        let b = point(13.10, 77.70);
        assert_eq!(distance_km(&a, &b).unwrap(), distance_km(&b, &a).unwrap());
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = point(51.5074, -0.1278);
        let paris = point(48.8566, 2.3522);
        let distance = distance_km(&london, &paris).unwrap();
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn nearby_requester_is_within_first_radius_step() {
        let driver = point(12.90, 77.58);
        let requester = point(12.91, 77.59);
        let distance = distance_km(&driver, &requester).unwrap();
        assert!((distance - 1.55).abs() < 0.05);
        assert!(distance < 10.0);
    }

    #[test]
    fn out_of_range_latitude_is_rejected() {
        let bad = point(91.0, 0.0);
        let ok = point(0.0, 0.0);
        assert!(matches!(
            distance_km(&bad, &ok),
            Err(DispatchError::InvalidCoordinates { .. })
        ));
        assert!(matches!(
            distance_km(&ok, &bad),
            Err(DispatchError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let bad = point(f64::NAN, 77.58);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn eta_rounds_up_to_whole_minutes() {
        let a = point(12.90, 77.58);
        let b = point(12.91, 77.59);
        // ~1.55 km at 40 km/h is ~2.3 minutes.
        assert_eq!(eta_minutes(&a, &b, 40.0).unwrap(), 3);
    }

    #[test]
    fn eta_rejects_non_positive_speed() {
        let a = point(12.90, 77.58);
        let b = point(12.91, 77.59);
        assert!(matches!(
            eta_minutes(&a, &b, 0.0),
            Err(DispatchError::InvalidSpeed(_))
        ));
        assert!(matches!(
            eta_minutes(&a, &b, -10.0),
            Err(DispatchError::InvalidSpeed(_))
        ));
    }
}
