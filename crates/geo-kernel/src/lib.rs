//! Geodetic Distance Kernel
//!
//! Pure WGS-84 helpers used by the hazard index and the query API:
//! haversine distance, initial bearing, and conservative bounding boxes
//! for pre-filtering proximity scans.

mod bbox;
mod point;

pub use bbox::BoundingBox;
pub use point::{GeoError, GeoPoint};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (haversine).
///
/// Commutative, zero for identical inputs, and monotone in angular
/// separation. Continuous across the antimeridian.
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    // Clamp guards sqrt against rounding just above 1.0 for near-antipodes.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` to `b` in degrees, normalised to `[0, 360)`.
pub fn bearing_deg(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let y = d_lon.sin() * lat_b.cos();
    let x = lat_a.cos() * lat_b.sin() - lat_a.sin() * lat_b.cos() * d_lon.cos();

    normalize_heading(y.atan2(x).to_degrees())
}

/// Normalise a heading in degrees to `[0, 360)`. Heading 360 maps to 0.
pub fn normalize_heading(heading: f64) -> f64 {
    let h = heading.rem_euclid(360.0);
    // rem_euclid can return 360.0 when the input is a tiny negative value.
    if h >= 360.0 {
        0.0
    } else {
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn distance_zero_for_identical_points() {
        let a = p(18.5204, 73.8589);
        assert!(distance_m(a, a) < 1e-6);
    }

    #[test]
    fn distance_known_city_pair() {
        // Pune to Delhi, roughly 1173-1185 km great-circle.
        let d = distance_m(p(18.52, 73.85), p(28.70, 77.10));
        assert!(d > 1_160_000.0 && d < 1_195_000.0, "got {d}");
    }

    #[test]
    fn distance_short_range() {
        // ~92 m apart near Pune city center.
        let d = distance_m(p(18.5204, 73.8589), p(18.5210, 73.8595));
        assert!(d > 85.0 && d < 95.0, "got {d}");
    }

    #[test]
    fn distance_continuous_at_antimeridian() {
        let west = p(0.0, -179.9);
        let east = p(0.0, 179.9);
        let d = distance_m(west, east);
        // 0.2 degrees of longitude at the equator, ~22.2 km, not ~40000 km.
        assert!(d > 20_000.0 && d < 25_000.0, "got {d}");
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = p(0.0, 0.0);
        assert!((bearing_deg(origin, p(1.0, 0.0)) - 0.0).abs() < 1e-6);
        assert!((bearing_deg(origin, p(0.0, 1.0)) - 90.0).abs() < 1e-6);
        assert!((bearing_deg(origin, p(-1.0, 0.0)) - 180.0).abs() < 1e-6);
        assert!((bearing_deg(origin, p(0.0, -1.0)) - 270.0).abs() < 1e-6);
    }

    #[test]
    fn heading_360_wraps_to_zero() {
        assert_eq!(normalize_heading(360.0), 0.0);
        assert_eq!(normalize_heading(0.0), 0.0);
        assert!((normalize_heading(450.0) - 90.0).abs() < 1e-9);
        assert!((normalize_heading(-90.0) - 270.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn distance_is_commutative(
            lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
        ) {
            let a = p(lat1, lon1);
            let b = p(lat2, lon2);
            let ab = distance_m(a, b);
            let ba = distance_m(b, a);
            prop_assert!((ab - ba).abs() < 1e-6);
        }

        #[test]
        fn distance_is_non_negative_and_bounded(
            lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
        ) {
            let d = distance_m(p(lat1, lon1), p(lat2, lon2));
            // Half the circumference is the maximum great-circle distance.
            prop_assert!(d >= 0.0);
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_M + 1.0);
        }

        #[test]
        fn bearing_stays_in_range(
            lat1 in -89.0f64..89.0, lon1 in -180.0f64..180.0,
            lat2 in -89.0f64..89.0, lon2 in -180.0f64..180.0,
        ) {
            let b = bearing_deg(p(lat1, lon1), p(lat2, lon2));
            prop_assert!((0.0..360.0).contains(&b));
        }
    }
}
