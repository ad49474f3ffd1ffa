//! Route-following movement engine.
//!
//! [`RouteSimulator`] walks a [`Route`] at a user-controlled speed on a single
//! tokio task. Each tick it asks the [`CurveDetector`] how much to slow down,
//! advances along the current segment, emits a jittered position through the
//! caller's callback and publishes speed, curve reduction and bearing to the
//! [`SynchronizationStore`] for hook consumers.
//!
//! `pause`, `resume` and `set_speed` only touch atomics the loop re-reads at the
//! top of every tick. `stop` additionally waits out an in-flight tick, so no
//! position is emitted once it returns. All of them may be called from any
//! thread, including from inside `on_position`.

mod curve_detector;
mod interpolator;
mod tick;

pub use curve_detector::{target_reduction, CurveDetector};
pub use interpolator::{exact_position, InterpolatedPosition, PositionInterpolator};
pub use tick::TickScheduler;

use crate::config::SimulatorConfig;
use crate::models::{Route, SpeedKmh, Waypoint};
use crate::sync::{BroadcastState, SynchronizationStore};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Read-only view of a simulation for UIs and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationProgress {
    pub segment_index: usize,
    pub segment_count: usize,
    pub distance_in_segment_m: f64,
    /// Distance covered since `start`, excluding jitter.
    pub traveled_m: f64,
    pub total_m: f64,
    pub curve_reduction: f64,
    pub running: bool,
    pub paused: bool,
}

impl Default for SimulationProgress {
    fn default() -> Self {
        SimulationProgress {
            segment_index: 0,
            segment_count: 0,
            distance_in_segment_m: 0.0,
            traveled_m: 0.0,
            total_m: 0.0,
            curve_reduction: 1.0,
            running: false,
            paused: false,
        }
    }
}

thread_local! {
    // Identifies the simulator whose tick body is executing on this thread, so a
    // `stop()` issued from inside `on_position` does not wait on its own gate.
    static ACTIVE_TICK: Cell<usize> = const { Cell::new(0) };
}

struct TickScope {
    previous: usize,
}

impl TickScope {
    fn enter(id: usize) -> Self {
        let previous = ACTIVE_TICK.with(|t| t.replace(id));
        TickScope { previous }
    }

    fn is_active(id: usize) -> bool {
        ACTIVE_TICK.with(|t| t.get() == id)
    }
}

impl Drop for TickScope {
    fn drop(&mut self) {
        ACTIVE_TICK.with(|t| t.set(self.previous));
    }
}

/// State shared between the public handle and the loop task.
struct Shared {
    store: Arc<dyn SynchronizationStore>,
    requested_speed_bits: AtomicU64,
    paused: AtomicBool,
    progress: Mutex<SimulationProgress>,
    // Held for the whole synchronous body of a tick; `stop()` takes it to wait
    // out an in-flight tick before resetting the store.
    gate: Mutex<()>,
}

/// Identity used to match a tick body with its simulator on the current thread.
fn tick_id(shared: &Arc<Shared>) -> usize {
    Arc::as_ptr(shared) as usize
}

impl Shared {
    fn requested_speed(&self) -> f64 {
        f64::from_bits(self.requested_speed_bits.load(Ordering::Acquire))
    }

    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update_progress(&self, f: impl FnOnce(&mut SimulationProgress)) {
        let mut progress = self.progress.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut progress);
    }
}

struct RunHandle {
    live: Arc<AtomicBool>,
    cancel: CancellationToken,
    // Kept so the task is not detached silently; the loop exits on its own.
    _task: JoinHandle<()>,
}

pub struct RouteSimulator {
    config: SimulatorConfig,
    shared: Arc<Shared>,
    waypoints: Mutex<Vec<Waypoint>>,
    run: Mutex<Option<RunHandle>>,
}

impl RouteSimulator {
    /// The initial control speed is whatever the store already holds, or the
    /// configured default when the store has never been written.
    ///
    /// A config that fails `validate()` is clamped into range with a warning.
    pub fn new(store: Arc<dyn SynchronizationStore>, config: SimulatorConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Simulator config out of range, clamping");
                config.sanitized()
            }
        };
        let persisted = store.snapshot();
        let initial_speed = if persisted.updated_at_ms > 0 {
            persisted.control_speed_kmh
        } else {
            config.default_speed_kmh
        };
        let initial_speed =
            SpeedKmh::clamped(initial_speed, config.min_speed_kmh, config.max_speed_kmh);

        tracing::debug!(
            backend = store.backend_name(),
            speed = %initial_speed,
            "Route simulator created"
        );

        RouteSimulator {
            shared: Arc::new(Shared {
                store,
                requested_speed_bits: AtomicU64::new(initial_speed.as_kmh().to_bits()),
                paused: AtomicBool::new(false),
                progress: Mutex::new(SimulationProgress::default()),
                gate: Mutex::new(()),
            }),
            config,
            waypoints: Mutex::new(Vec::new()),
            run: Mutex::new(None),
        }
    }

    /// Replace the waypoints used by the next `start()`. A running simulation
    /// keeps the route it started with.
    pub fn load_route(&self, waypoints: Vec<Waypoint>) {
        tracing::debug!(count = waypoints.len(), "Route loaded");
        *self.waypoints.lock().unwrap_or_else(|e| e.into_inner()) = waypoints;
    }

    /// Begin walking the loaded route on the current tokio runtime.
    ///
    /// Routes with fewer than two points, or whose segments are all degenerate,
    /// are logged and ignored. A running simulation is stopped first.
    pub fn start<P, C>(&self, on_position: P, on_complete: C)
    where
        P: Fn(Waypoint) + Send + Sync + 'static,
        C: FnOnce() + Send + 'static,
    {
        let waypoints = self.waypoints.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let route = match Route::new(waypoints) {
            Ok(route) if route.is_degenerate(self.config.degenerate_segment_meters) => {
                tracing::warn!(
                    points = route.len(),
                    "Ignoring start: every segment of the route is degenerate"
                );
                return;
            }
            Ok(route) => route,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring start: route is not usable");
                return;
            }
        };

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Ignoring start: no tokio runtime available");
                return;
            }
        };

        self.stop_run();

        let seed = self.config.seed.unwrap_or_else(rand::random::<u64>);
        let (tick_min, tick_max) = self.config.tick_band();
        let live = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        self.shared.paused.store(false, Ordering::Release);
        self.shared.update_progress(|p| {
            *p = SimulationProgress {
                segment_count: route.segment_count(),
                total_m: route.total_length_m(),
                running: true,
                ..SimulationProgress::default()
            }
        });
        self.shared.store.update_actual_speed(0.0);

        tracing::info!(
            points = route.len(),
            total_m = %format!("{:.1}", route.total_length_m()),
            speed = %SpeedKmh(self.shared.requested_speed()),
            "Starting route simulation"
        );

        let run = SimulationRun {
            shared: self.shared.clone(),
            live: live.clone(),
            cancel: cancel.clone(),
            detector: CurveDetector::new(
                self.config.curve_blend_alpha,
                self.config.curve_recovery_per_tick,
            ),
            interpolator: PositionInterpolator::new(
                self.config.jitter_max_meters,
                seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
            ),
            ticks: TickScheduler::new(tick_min, tick_max, seed),
            degenerate_segment_m: self.config.degenerate_segment_meters,
            route,
            segment_index: 0,
            distance_in_segment_m: 0.0,
            completed_segments_m: 0.0,
            resting: false,
            on_position: Box::new(on_position),
            on_complete: Some(Box::new(on_complete)),
        };

        let task = runtime.spawn(run.run());
        *self.run.lock().unwrap_or_else(|e| e.into_inner()) = Some(RunHandle {
            live,
            cancel,
            _task: task,
        });
    }

    /// Freeze position advancement. The loop keeps ticking so `resume` is immediate.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
        tracing::info!("Route simulation paused");
    }

    /// Continue from exactly where `pause` left off.
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
        tracing::info!("Route simulation resumed");
    }

    /// Cancel the loop and reset the store to neutral motion.
    ///
    /// Once this returns no further position is emitted, even if a tick was in
    /// flight on another thread. Safe to call when nothing is running.
    pub fn stop(&self) {
        self.stop_run();
        self.shared.paused.store(false, Ordering::Release);
        self.shared.update_progress(|p| {
            p.running = false;
            p.paused = false;
        });
        self.shared.store.reset();
    }

    /// Clamp to the configured range and apply from the next tick on. The store
    /// sees the new control speed immediately, running or not.
    pub fn set_speed(&self, kmh: f64) {
        let speed = SpeedKmh::clamped(kmh, self.config.min_speed_kmh, self.config.max_speed_kmh);
        self.shared
            .requested_speed_bits
            .store(speed.as_kmh().to_bits(), Ordering::Release);
        self.shared.store.set_control_speed(speed.as_kmh());
        tracing::debug!(requested = kmh, applied = %speed, "Control speed updated");
    }

    /// Requested (control) speed in km/h.
    pub fn speed(&self) -> f64 {
        self.shared.requested_speed()
    }

    pub fn is_running(&self) -> bool {
        self.run
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|run| run.live.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    pub fn progress(&self) -> SimulationProgress {
        *self
            .shared
            .progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn stop_run(&self) {
        let Some(run) = self.run.lock().unwrap_or_else(|e| e.into_inner()).take() else {
            return;
        };

        let was_live = run.live.swap(false, Ordering::AcqRel);
        run.cancel.cancel();
        if !TickScope::is_active(tick_id(&self.shared)) {
            // Wait out a tick body running on another thread.
            drop(self.shared.lock_gate());
        }
        if was_live {
            tracing::info!("Route simulation stopped");
        }
    }
}

impl Drop for RouteSimulator {
    fn drop(&mut self) {
        self.stop_run();
        self.shared.store.reset();
    }
}

enum TickOutcome {
    Sleep(Duration),
    /// Skip straight to the next iteration (degenerate segment).
    Next,
    Finished,
    Stopped,
}

/// Simulation state owned by the loop task for the duration of one run.
struct SimulationRun {
    shared: Arc<Shared>,
    live: Arc<AtomicBool>,
    cancel: CancellationToken,
    route: Route,
    detector: CurveDetector,
    interpolator: PositionInterpolator,
    ticks: TickScheduler,
    degenerate_segment_m: f64,
    segment_index: usize,
    distance_in_segment_m: f64,
    completed_segments_m: f64,
    resting: bool,
    on_position: Box<dyn Fn(Waypoint) + Send + Sync>,
    on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl SimulationRun {
    async fn run(mut self) {
        loop {
            match self.tick() {
                TickOutcome::Sleep(interval) => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
                TickOutcome::Next => continue,
                TickOutcome::Finished => {
                    self.finish();
                    break;
                }
                TickOutcome::Stopped => break,
            }
        }
        tracing::debug!(segment = self.segment_index, "Simulation loop exited");
    }

    fn tick(&mut self) -> TickOutcome {
        let shared = self.shared.clone();
        let _gate = shared.lock_gate();
        let _scope = TickScope::enter(tick_id(&shared));

        if !self.live.load(Ordering::Acquire) {
            return TickOutcome::Stopped;
        }
        if self.segment_index >= self.route.segment_count() {
            return TickOutcome::Finished;
        }

        if shared.paused.load(Ordering::Acquire) {
            if !self.resting {
                self.resting = true;
                shared.store.update_actual_speed(0.0);
                shared.update_progress(|p| p.paused = true);
            }
            return TickOutcome::Sleep(self.ticks.next_interval());
        }
        if self.resting {
            self.resting = false;
            shared.update_progress(|p| p.paused = false);
        }

        let Some((start, end, next)) = self.route.segment(self.segment_index) else {
            return TickOutcome::Finished;
        };

        let segment_length = start.distance_m(&end);
        if segment_length < self.degenerate_segment_m {
            tracing::debug!(segment = self.segment_index, "Skipping degenerate segment");
            self.advance_segment(segment_length);
            return TickOutcome::Next;
        }

        let reduction = self.detector.detect(&start, &end, next.as_ref());
        let interval = self.ticks.next_interval();
        let requested = SpeedKmh(shared.requested_speed());
        let actual = SpeedKmh(requested.as_kmh() * reduction);
        let bearing = start
            .bearing_to(&end)
            .unwrap_or_else(|| shared.store.get_bearing());

        self.distance_in_segment_m += actual.distance_over(interval.as_secs_f64()).as_meters();
        if self.distance_in_segment_m >= segment_length && self.only_degenerate_segments_remain() {
            // Arrival: `finish` emits the exact destination, once.
            self.advance_segment(segment_length);
            return TickOutcome::Finished;
        }
        let position = self
            .interpolator
            .interpolate(&start, &end, self.distance_in_segment_m);

        shared.store.publish(BroadcastState {
            control_speed_kmh: requested.as_kmh(),
            actual_speed_kmh: actual.as_kmh(),
            curve_reduction: reduction,
            bearing_degrees: bearing,
            position: Some(position.reported),
            updated_at_ms: 0,
        });

        let segment_index = self.segment_index;
        let in_segment = self.distance_in_segment_m.min(segment_length);
        let traveled = self.completed_segments_m + in_segment;
        shared.update_progress(|p| {
            p.segment_index = segment_index;
            p.distance_in_segment_m = in_segment;
            p.traveled_m = traveled;
            p.curve_reduction = reduction;
        });

        tracing::debug!(
            segment = segment_index,
            fraction = %format!("{:.3}", position.fraction),
            speed_kmh = %format!("{:.1}", actual.as_kmh()),
            curve = %format!("{:.3}", reduction),
            interval_ms = interval.as_millis() as u64,
            "Tick"
        );

        (self.on_position)(position.reported);

        if self.distance_in_segment_m >= segment_length {
            self.advance_segment(segment_length);
        }
        TickOutcome::Sleep(interval)
    }

    fn only_degenerate_segments_remain(&self) -> bool {
        self.route.waypoints()[self.segment_index + 1..]
            .windows(2)
            .all(|w| w[0].distance_m(&w[1]) < self.degenerate_segment_m)
    }

    fn advance_segment(&mut self, segment_length: f64) {
        self.completed_segments_m += segment_length;
        self.segment_index += 1;
        self.distance_in_segment_m = 0.0;
    }

    /// Emit the exact destination once, neutralize the store, then report
    /// completion outside the tick gate so `on_complete` may start a new run.
    fn finish(&mut self) {
        let shared = self.shared.clone();
        {
            let _gate = shared.lock_gate();
            let _scope = TickScope::enter(tick_id(&shared));
            if !self.live.load(Ordering::Acquire) {
                return;
            }

            let destination = self.route.destination();
            let at_rest = BroadcastState {
                position: Some(destination),
                ..shared.store.snapshot().at_rest()
            };
            shared.store.publish(at_rest);

            let total = self.completed_segments_m;
            let last_segment = self.route.segment_count() - 1;
            shared.update_progress(|p| {
                p.segment_index = last_segment;
                p.traveled_m = total;
                p.curve_reduction = 1.0;
                p.running = false;
                p.paused = false;
            });

            (self.on_position)(destination);

            if !self.live.swap(false, Ordering::AcqRel) {
                // stop() was called from inside the final on_position
                return;
            }
        }

        tracing::info!(
            total_m = %format!("{:.1}", self.completed_segments_m),
            "Route simulation completed"
        );
        if let Some(on_complete) = self.on_complete.take() {
            on_complete();
        }
    }
}
