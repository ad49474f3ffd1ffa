use serde::{Deserialize, Serialize};
use std::fmt;

/// Speed in kilometers per hour
/// Prevents mixing up km/h and m/s across the simulator and the hooks
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SpeedKmh(pub f64);

impl SpeedKmh {
    /// Clamp into `[min, max]`. NaN maps to `min`, infinities to the nearest bound.
    pub fn clamped(kmh: f64, min: f64, max: f64) -> Self {
        if kmh.is_nan() {
            return SpeedKmh(min);
        }
        SpeedKmh(kmh.clamp(min, max))
    }

    /// Convert to meters per second
    pub fn to_mps(self) -> f64 {
        self.0 / 3.6
    }

    /// Get the raw km/h value
    pub fn as_kmh(self) -> f64 {
        self.0
    }

    /// Meters covered at this speed over `seconds`.
    pub fn distance_over(self, seconds: f64) -> DistanceMeters {
        DistanceMeters((self.to_mps() * seconds).max(0.0))
    }
}

impl fmt::Display for SpeedKmh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}km/h", self.0)
    }
}

/// Distance in meters
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
pub struct DistanceMeters(pub f64);

impl DistanceMeters {
    /// Get the raw meters value
    pub fn as_meters(self) -> f64 {
        self.0
    }
}

impl fmt::Display for DistanceMeters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}m", self.0)
    }
}
