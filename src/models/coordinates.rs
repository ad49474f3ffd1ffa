use crate::constants::METERS_PER_DEGREE;
use crate::error::{AppError, Result};
use geo::{Bearing, Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

/// A single decimal latitude/longitude pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
}

impl Waypoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::InvalidCoordinates(format!(
                "Invalid latitude: {} (must be between -90 and 90)",
                lat
            )));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::InvalidCoordinates(format!(
                "Invalid longitude: {} (must be between -180 and 180)",
                lng
            )));
        }
        Ok(Waypoint { lat, lng })
    }

    /// Great-circle distance in meters (Haversine).
    pub fn distance_m(&self, other: &Waypoint) -> f64 {
        Haversine.distance(Point::from(*self), Point::from(*other))
    }

    /// Initial compass bearing towards `other`, in degrees [0, 360).
    /// Returns `None` when the two points coincide or the result is not finite.
    pub fn bearing_to(&self, other: &Waypoint) -> Option<f64> {
        if self == other {
            return None;
        }
        let bearing = Haversine.bearing(Point::from(*self), Point::from(*other));
        bearing.is_finite().then(|| bearing.rem_euclid(360.0))
    }

    /// Linear interpolation in lat/lng space. Fine for the short segments
    /// routing services return; not a geodesic.
    pub fn lerp(&self, other: &Waypoint, fraction: f64) -> Waypoint {
        Waypoint {
            lat: self.lat + (other.lat - self.lat) * fraction,
            lng: self.lng + (other.lng - self.lng) * fraction,
        }
    }

    /// Shift by a local north/east offset in meters (equirectangular).
    /// Latitude is clamped to the poles, longitude wraps.
    pub fn offset_m(&self, north_m: f64, east_m: f64) -> Waypoint {
        let lat = (self.lat + north_m / METERS_PER_DEGREE).clamp(-90.0, 90.0);
        let cos_lat = self.lat.to_radians().cos();
        let lng = if cos_lat.abs() < 1e-9 {
            self.lng
        } else {
            self.lng + east_m / (METERS_PER_DEGREE * cos_lat)
        };
        Waypoint {
            lat,
            lng: wrap_longitude(lng),
        }
    }
}

impl From<Waypoint> for Point<f64> {
    fn from(w: Waypoint) -> Self {
        Point::new(w.lng, w.lat)
    }
}

fn wrap_longitude(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }
}
