//! Single-writer, many-reader register bridging the simulator to hook code.
//!
//! The simulator writes through a [`SynchronizationStore`]; hook consumers,
//! possibly in other OS processes, read through a [`BroadcastSource`].

pub mod file;
pub mod memory;

pub use file::{FileSyncReader, FileSyncStore};
pub use memory::MemorySyncStore;

use crate::constants::*;
use crate::models::{SpeedKmh, Waypoint};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Motion telemetry as seen by hook consumers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BroadcastState {
    /// Raw user-set speed, unaffected by curves.
    pub control_speed_kmh: f64,
    /// Control speed scaled by the curve reduction.
    pub actual_speed_kmh: f64,
    pub curve_reduction: f64,
    pub bearing_degrees: f64,
    /// Last emitted position, kept across resets so the device stays parked.
    #[serde(default)]
    pub position: Option<Waypoint>,
    /// Unix time of the last write, in milliseconds. Zero means never written.
    #[serde(default)]
    pub updated_at_ms: i64,
}

impl BroadcastState {
    /// The state readers see before any writer has run.
    pub const NEUTRAL: BroadcastState = BroadcastState {
        control_speed_kmh: MIN_SPEED_KMH,
        actual_speed_kmh: NEUTRAL_ACTUAL_SPEED_KMH,
        curve_reduction: NEUTRAL_CURVE_REDUCTION,
        bearing_degrees: NEUTRAL_BEARING_DEGREES,
        position: None,
        updated_at_ms: 0,
    };

    /// Clamp every field into its valid domain.
    pub fn sanitized(self) -> Self {
        BroadcastState {
            control_speed_kmh: clamp_speed(self.control_speed_kmh),
            actual_speed_kmh: clamp_speed(self.actual_speed_kmh),
            curve_reduction: clamp_curve_reduction(self.curve_reduction),
            bearing_degrees: normalize_bearing(self.bearing_degrees),
            position: self
                .position
                .and_then(|p| Waypoint::new(p.lat, p.lng).ok()),
            updated_at_ms: self.updated_at_ms,
        }
    }

    /// Same state with the motion fields neutralized. Control speed and
    /// position survive.
    pub fn at_rest(self) -> Self {
        BroadcastState {
            actual_speed_kmh: NEUTRAL_ACTUAL_SPEED_KMH,
            curve_reduction: NEUTRAL_CURVE_REDUCTION,
            bearing_degrees: NEUTRAL_BEARING_DEGREES,
            ..self
        }
    }

    pub fn is_moving(&self) -> bool {
        self.actual_speed_kmh > 0.0
    }

    /// Milliseconds since the last write, or `None` if never written.
    pub fn age_ms(&self, now_ms: i64) -> Option<i64> {
        (self.updated_at_ms > 0).then(|| (now_ms - self.updated_at_ms).max(0))
    }
}

impl Default for BroadcastState {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Read side of the register.
pub trait BroadcastSource: Send + Sync {
    /// Current snapshot. Must not block on the writer; a stale value is fine.
    fn snapshot(&self) -> BroadcastState;

    fn get_control_speed(&self) -> f64 {
        self.snapshot().control_speed_kmh
    }

    fn get_actual_speed(&self) -> f64 {
        self.snapshot().actual_speed_kmh
    }

    fn get_curve_reduction(&self) -> f64 {
        self.snapshot().curve_reduction
    }

    fn get_bearing(&self) -> f64 {
        self.snapshot().bearing_degrees
    }

    fn get_position(&self) -> Option<Waypoint> {
        self.snapshot().position
    }
}

/// Write side of the register. Writes clamp, are last-write-wins, and never fail
/// from the caller's point of view; persistence problems are logged.
pub trait SynchronizationStore: BroadcastSource {
    fn set_control_speed(&self, kmh: f64);

    fn update_actual_speed(&self, kmh: f64);

    fn update_curve_reduction(&self, factor: f64);

    fn update_bearing(&self, degrees: f64);

    fn update_position(&self, position: Waypoint);

    /// Write every field in one step.
    fn publish(&self, state: BroadcastState);

    /// Neutralize the motion fields in one step readers observe atomically.
    fn reset(&self);

    fn backend_name(&self) -> &'static str;
}

pub fn clamp_speed(kmh: f64) -> f64 {
    SpeedKmh::clamped(kmh, MIN_SPEED_KMH, MAX_SPEED_KMH).as_kmh()
}

pub fn clamp_curve_reduction(factor: f64) -> f64 {
    if factor.is_nan() {
        return NEUTRAL_CURVE_REDUCTION;
    }
    factor.clamp(CURVE_REDUCTION_FLOOR, 1.0)
}

pub fn normalize_bearing(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return NEUTRAL_BEARING_DEGREES;
    }
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Wall-clock milliseconds used to stamp snapshots.
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
