//! Great-circle distance helpers.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Whether latitude is in [-90, 90] and longitude in [-180, 180].
    ///
    /// NaN components are never valid.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// Haversine distance to another point in kilometres.
    pub fn distance_km_to(&self, other: &GeoPoint) -> f64 {
        distance_km(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Great-circle distance between two points in kilometres (haversine).
///
/// The `min(1, sqrt(a))` clamp keeps `asin` inside its domain when rounding
/// pushes `a` slightly above one near antipodal points.
///
/// ```
/// use shelterfinder_lib::geo::distance_km;
///
/// // One degree of latitude is roughly 111 km.
/// let d = distance_km(35.0, 139.0, 36.0, 139.0);
/// assert!((d - 111.19).abs() < 0.1);
/// ```
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Round a distance to three decimal places (metre precision).
pub fn round_km(distance: f64) -> f64 {
    (distance * 1000.0).round() / 1000.0
}
