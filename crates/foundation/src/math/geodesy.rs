use crate::bounds::LatLng;

/// Mean Earth radius used for great-circle distances (kilometers).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Length of one degree of latitude on the haversine sphere (kilometers).
pub const KM_PER_DEGREE_LAT: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// Great-circle distance in kilometers between two points given in degrees.
///
/// The distance from a point to itself is exactly `0.0`.
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    let a = a.min(1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn haversine_km(a: LatLng, b: LatLng) -> f64 {
    haversine_distance(a.lat, a.lng, b.lat, b.lng)
}

/// Kilometers spanned by one degree of longitude at `lat_deg`.
pub fn km_per_degree_lng(lat_deg: f64) -> f64 {
    KM_PER_DEGREE_LAT * lat_deg.to_radians().cos()
}

#[cfg(test)]
mod tests {
    use super::{KM_PER_DEGREE_LAT, haversine_distance, km_per_degree_lng};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn self_distance_is_exactly_zero() {
        assert_eq!(haversine_distance(43.5448, -80.2482, 43.5448, -80.2482), 0.0);
        assert_eq!(haversine_distance(-89.9, 179.9, -89.9, 179.9), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        assert_close(haversine_distance(0.0, 0.0, 1.0, 0.0), KM_PER_DEGREE_LAT, 1e-9);
        assert_close(KM_PER_DEGREE_LAT, 111.195, 1e-3);
    }

    #[test]
    fn toronto_to_ottawa() {
        // ~352 km great-circle.
        let d = haversine_distance(43.6532, -79.3832, 45.4215, -75.6972);
        assert!(d > 340.0 && d < 360.0, "{d}");
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let d = haversine_distance(0.0, 0.0, 0.0, 180.0);
        assert_close(d, std::f64::consts::PI * super::EARTH_RADIUS_KM, 1e-6);
    }

    #[test]
    fn longitude_shrinks_toward_poles() {
        assert_close(km_per_degree_lng(0.0), KM_PER_DEGREE_LAT, 1e-9);
        assert_close(km_per_degree_lng(60.0), KM_PER_DEGREE_LAT / 2.0, 1e-9);
        assert!(km_per_degree_lng(89.0) < 2.0);
    }
}
