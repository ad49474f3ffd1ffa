use routemock::config::SimulatorConfig;
use routemock::models::Waypoint;
use routemock::sync::{BroadcastSource, BroadcastState, MemorySyncStore, SynchronizationStore};
use std::sync::Mutex;

/// Shorthand for a known-valid waypoint
#[allow(dead_code)]
pub fn wp(lat: f64, lng: f64) -> Waypoint {
    Waypoint::new(lat, lng).unwrap()
}

/// Deterministic simulator settings: fixed seed, no jitter
#[allow(dead_code)]
pub fn quiet_config() -> SimulatorConfig {
    SimulatorConfig {
        jitter_max_meters: 0.0,
        seed: Some(7),
        ..Default::default()
    }
}

/// Memory store that also keeps every full snapshot the simulator publishes.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingStore {
    inner: MemorySyncStore,
    published: Mutex<Vec<BroadcastState>>,
}

#[allow(dead_code)]
impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<BroadcastState> {
        self.published.lock().unwrap().clone()
    }
}

impl BroadcastSource for RecordingStore {
    fn snapshot(&self) -> BroadcastState {
        self.inner.snapshot()
    }
}

impl SynchronizationStore for RecordingStore {
    fn set_control_speed(&self, kmh: f64) {
        self.inner.set_control_speed(kmh);
    }

    fn update_actual_speed(&self, kmh: f64) {
        self.inner.update_actual_speed(kmh);
    }

    fn update_curve_reduction(&self, factor: f64) {
        self.inner.update_curve_reduction(factor);
    }

    fn update_bearing(&self, degrees: f64) {
        self.inner.update_bearing(degrees);
    }

    fn update_position(&self, position: Waypoint) {
        self.inner.update_position(position);
    }

    fn publish(&self, state: BroadcastState) {
        self.inner.publish(state);
        self.published.lock().unwrap().push(self.inner.snapshot());
    }

    fn reset(&self) {
        self.inner.reset();
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}
