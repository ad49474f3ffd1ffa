use crate::constants::SPOOFED_ACCURACY_METERS;
use crate::hooks::fresh_snapshot;
use crate::models::SpeedKmh;
use crate::sync::BroadcastSource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Fix handed to a location hook. Field types follow what platform location
/// objects carry (`f32` speed in m/s, `f32` bearing in degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpoofedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_mps: f32,
    pub bearing: f32,
    pub accuracy_m: f32,
}

/// What a location-value interceptor asks for.
pub trait LocationValueProvider: Send + Sync {
    /// Whether the simulated device is currently moving.
    fn is_active(&self) -> bool;

    fn speed_mps(&self) -> f32;

    fn bearing(&self) -> f32;

    /// Full fix, or `None` when no position has ever been published.
    fn location(&self) -> Option<SpoofedLocation>;
}

pub struct SpoofedLocationProvider {
    source: Arc<dyn BroadcastSource>,
    stale_after: Duration,
}

impl SpoofedLocationProvider {
    pub fn new(source: Arc<dyn BroadcastSource>, stale_after: Duration) -> Self {
        SpoofedLocationProvider {
            source,
            stale_after,
        }
    }
}

impl LocationValueProvider for SpoofedLocationProvider {
    fn is_active(&self) -> bool {
        fresh_snapshot(&self.source, self.stale_after).is_moving()
    }

    fn speed_mps(&self) -> f32 {
        let state = fresh_snapshot(&self.source, self.stale_after);
        SpeedKmh(state.actual_speed_kmh).to_mps() as f32
    }

    fn bearing(&self) -> f32 {
        fresh_snapshot(&self.source, self.stale_after).bearing_degrees as f32
    }

    fn location(&self) -> Option<SpoofedLocation> {
        let state = fresh_snapshot(&self.source, self.stale_after);
        let position = state.position?;
        Some(SpoofedLocation {
            latitude: position.lat,
            longitude: position.lng,
            speed_mps: SpeedKmh(state.actual_speed_kmh).to_mps() as f32,
            bearing: state.bearing_degrees as f32,
            accuracy_m: SPOOFED_ACCURACY_METERS,
        })
    }
}
