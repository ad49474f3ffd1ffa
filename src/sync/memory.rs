use crate::models::Waypoint;
use crate::sync::{
    clamp_curve_reduction, clamp_speed, normalize_bearing, now_ms, BroadcastSource,
    BroadcastState, SynchronizationStore,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-process register. Good for single-process use and tests, and the fast
/// path inside [`FileSyncStore`](crate::sync::FileSyncStore).
/// All methods are `&self`; a reader never sees a half-applied `publish` or `reset`.
pub struct MemorySyncStore {
    state: RwLock<BroadcastState>,
    writes: AtomicU64,
}

impl MemorySyncStore {
    pub fn new() -> Self {
        MemorySyncStore {
            state: RwLock::new(BroadcastState::NEUTRAL),
            writes: AtomicU64::new(0),
        }
    }

    /// Start from a previously persisted snapshot.
    pub fn with_state(state: BroadcastState) -> Self {
        MemorySyncStore {
            state: RwLock::new(state.sanitized()),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of writes applied since creation.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Apply `f` under the write lock and return the resulting snapshot.
    pub(crate) fn modify(&self, f: impl FnOnce(&mut BroadcastState)) -> BroadcastState {
        let mut guard = self.write_guard();
        f(&mut guard);
        guard.updated_at_ms = now_ms();
        self.writes.fetch_add(1, Ordering::Relaxed);
        *guard
    }

    // A panicking writer must not take hook readers down with it.
    fn read_guard(&self) -> RwLockReadGuard<'_, BroadcastState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, BroadcastState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemorySyncStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastSource for MemorySyncStore {
    fn snapshot(&self) -> BroadcastState {
        *self.read_guard()
    }
}

impl SynchronizationStore for MemorySyncStore {
    fn set_control_speed(&self, kmh: f64) {
        self.modify(|s| s.control_speed_kmh = clamp_speed(kmh));
    }

    fn update_actual_speed(&self, kmh: f64) {
        self.modify(|s| s.actual_speed_kmh = clamp_speed(kmh));
    }

    fn update_curve_reduction(&self, factor: f64) {
        self.modify(|s| s.curve_reduction = clamp_curve_reduction(factor));
    }

    fn update_bearing(&self, degrees: f64) {
        self.modify(|s| s.bearing_degrees = normalize_bearing(degrees));
    }

    fn update_position(&self, position: Waypoint) {
        if Waypoint::new(position.lat, position.lng).is_err() {
            tracing::warn!(?position, "Ignoring out-of-range position");
            return;
        }
        self.modify(|s| s.position = Some(position));
    }

    fn publish(&self, state: BroadcastState) {
        let state = state.sanitized();
        self.modify(|s| *s = state);
    }

    fn reset(&self) {
        self.modify(|s| *s = s.at_rest());
        tracing::debug!("Memory sync store reset to neutral");
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
