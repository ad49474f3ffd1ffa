use crate::constants::{CURVE_REDUCTION_FLOOR, MAX_LATERAL_LOAD, MAX_SPEED_KMH, VIBRATION_AT_MAX_SPEED};
use crate::hooks::fresh_snapshot;
use crate::sync::BroadcastSource;
use rand::distr::{Distribution, StandardUniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Sensors whose readings are made to agree with the simulated motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    MagneticField,
    Other,
}

impl SensorKind {
    /// Map an Android `Sensor.TYPE_*` constant.
    pub fn from_android_type(sensor_type: i32) -> Self {
        match sensor_type {
            1 | 10 => SensorKind::Accelerometer, // TYPE_ACCELEROMETER, TYPE_LINEAR_ACCELERATION
            4 | 16 => SensorKind::Gyroscope,     // TYPE_GYROSCOPE(_UNCALIBRATED)
            2 | 14 => SensorKind::MagneticField, // TYPE_MAGNETIC_FIELD(_UNCALIBRATED)
            _ => SensorKind::Other,
        }
    }
}

/// What a sensor-value interceptor asks for. `values` is the event's value
/// array in device coordinates and is modified in place.
pub trait SensorValueProvider: Send + Sync {
    fn adjust(&self, kind: SensorKind, values: &mut [f32]);
}

struct SensorState {
    rng: StdRng,
    last_heading: Option<(f64, Instant)>,
}

/// Shapes raw sensor readings after the broadcast motion: vibration and
/// cornering load on the accelerometer, yaw rate on the gyroscope, and a
/// compass that points along the simulated bearing. Readings pass through
/// untouched while the device is at rest.
pub struct SpoofedSensorProvider {
    source: Arc<dyn BroadcastSource>,
    stale_after: Duration,
    state: Mutex<SensorState>,
}

impl SpoofedSensorProvider {
    pub fn new(source: Arc<dyn BroadcastSource>, stale_after: Duration) -> Self {
        Self::with_seed(source, stale_after, rand::random::<u64>())
    }

    pub fn with_seed(source: Arc<dyn BroadcastSource>, stale_after: Duration, seed: u64) -> Self {
        SpoofedSensorProvider {
            source,
            stale_after,
            state: Mutex::new(SensorState {
                rng: StdRng::seed_from_u64(seed),
                last_heading: None,
            }),
        }
    }
}

impl SensorValueProvider for SpoofedSensorProvider {
    fn adjust(&self, kind: SensorKind, values: &mut [f32]) {
        if kind == SensorKind::Other {
            return;
        }
        let motion = fresh_snapshot(&self.source, self.stale_after);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if !motion.is_moving() {
            state.last_heading = None;
            return;
        }

        match kind {
            SensorKind::Accelerometer => {
                let speed_ratio = (motion.actual_speed_kmh / MAX_SPEED_KMH) as f32;
                let amplitude = VIBRATION_AT_MAX_SPEED * speed_ratio.sqrt();
                for value in values.iter_mut().take(3) {
                    let u: f32 = StandardUniform.sample(&mut state.rng);
                    *value += (u * 2.0 - 1.0) * amplitude;
                }
                // Cornering load grows as the curve reduction drops toward its floor.
                let cornering = ((1.0 - motion.curve_reduction) / (1.0 - CURVE_REDUCTION_FLOOR))
                    .clamp(0.0, 1.0) as f32;
                if let Some(x) = values.get_mut(0) {
                    *x += MAX_LATERAL_LOAD * cornering;
                }
            }
            SensorKind::Gyroscope => {
                let now = Instant::now();
                let yaw = match state.last_heading {
                    Some((previous, at)) => {
                        let dt = now.duration_since(at).as_secs_f64().max(0.05);
                        let delta = (motion.bearing_degrees - previous + 540.0).rem_euclid(360.0) - 180.0;
                        // Compass bearings grow clockwise; the z axis is counter-clockwise positive.
                        -(delta.to_radians() / dt) as f32
                    }
                    None => 0.0,
                };
                state.last_heading = Some((motion.bearing_degrees, now));
                if let Some(z) = values.get_mut(2) {
                    *z += yaw;
                }
            }
            SensorKind::MagneticField => {
                if values.len() < 2 {
                    return;
                }
                let horizontal = values[0].hypot(values[1]);
                let heading = motion.bearing_degrees.to_radians();
                values[0] = -horizontal * heading.sin() as f32;
                values[1] = horizontal * heading.cos() as f32;
            }
            SensorKind::Other => {}
        }
    }
}
