//! Conservative lat/lon bounding boxes
//!
//! Used as a cheap pre-filter before exact haversine checks. The box is
//! always at least as large as the circle it encloses; candidates inside
//! still need the exact distance test.

use crate::GeoPoint;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// A latitude/longitude rectangle. May wrap the antimeridian, in which
/// case `west > east`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Build a box from explicit edges (S, W, N, E).
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Conservative box around `center` enclosing a circle of `radius_m`.
    ///
    /// Longitude span widens with latitude; near the poles, where the
    /// cosine degenerates, the box covers the full longitude range.
    pub fn around(center: GeoPoint, radius_m: f64) -> Self {
        let lat_off = radius_m / METERS_PER_DEGREE;
        let south = (center.latitude - lat_off).max(-90.0);
        let north = (center.latitude + lat_off).min(90.0);

        let cos_lat = center.latitude.to_radians().cos();
        let lon_off = radius_m / (METERS_PER_DEGREE * cos_lat);
        if !lon_off.is_finite() || lon_off >= 180.0 {
            // Degenerate near the poles: every meridian is within reach.
            return Self::new(south, -180.0, north, 180.0);
        }

        // Wrap edges into [-180, 180]; west > east encodes antimeridian wrap.
        let west = wrap_lon(center.longitude - lon_off);
        let east = wrap_lon(center.longitude + lon_off);
        Self::new(south, west, north, east)
    }

    /// Whether `point` falls inside the box, honouring antimeridian wrap.
    pub fn contains(&self, point: GeoPoint) -> bool {
        if point.latitude < self.south || point.latitude > self.north {
            return false;
        }
        if self.west <= self.east {
            point.longitude >= self.west && point.longitude <= self.east
        } else {
            point.longitude >= self.west || point.longitude <= self.east
        }
    }
}

fn wrap_lon(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}
