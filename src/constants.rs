//! Stable application-wide constants.
//!
//! Values here are structural invariants, algorithm coefficients, and default
//! fallbacks for env-var-based configuration. They should rarely change.
//! For knobs that benefit from runtime experimentation, see
//! [`SimulatorConfig`](crate::config::SimulatorConfig) instead.

// --- Speed domain (km/h) ---

/// Lowest speed accepted by `set_speed` and the synchronization store.
pub const MIN_SPEED_KMH: f64 = 0.0;
/// Highest speed accepted by `set_speed` and the synchronization store.
pub const MAX_SPEED_KMH: f64 = 350.0;
/// Control speed used when nothing else has been requested.
pub const DEFAULT_SPEED_KMH: f64 = 40.0;

// --- Tick cadence (milliseconds) ---
// Each tick sleeps for a fresh random duration inside this band so the
// update cadence never settles into a fixed period.

/// Shortest tick interval.
pub const DEFAULT_TICK_MIN_MS: u64 = 250;
/// Longest tick interval.
pub const DEFAULT_TICK_MAX_MS: u64 = 350;

// --- Position jitter ---

/// Upper bound (meters) of the receiver-noise offset added to emitted positions.
pub const DEFAULT_JITTER_MAX_METERS: f64 = 3.0;

/// Segments shorter than this (meters) are skipped instead of walked.
pub const DEFAULT_DEGENERATE_SEGMENT_METERS: f64 = 0.05;

// --- Curve detection ---

/// Turn-angle bands: `(upper bound in degrees, target reduction)`.
/// Checked in order; angles past the last bound use [`SHARP_TURN_REDUCTION`].
pub const CURVE_BANDS: [(f64, f64); 4] = [(20.0, 1.0), (40.0, 0.85), (60.0, 0.75), (90.0, 0.65)];
/// Target reduction for turns of 90 degrees and more.
pub const SHARP_TURN_REDUCTION: f64 = 0.50;
/// Weight of the previous effective reduction in the per-tick blend.
pub const DEFAULT_CURVE_BLEND_ALPHA: f64 = 0.85;
/// Per-tick step back toward 1.0 once there is no upcoming turn.
pub const DEFAULT_CURVE_RECOVERY_PER_TICK: f64 = 0.05;
/// Lowest curve reduction the synchronization store will hold.
pub const CURVE_REDUCTION_FLOOR: f64 = 0.3;

// --- Neutral broadcast values ---

pub const NEUTRAL_ACTUAL_SPEED_KMH: f64 = 0.0;
pub const NEUTRAL_CURVE_REDUCTION: f64 = 1.0;
pub const NEUTRAL_BEARING_DEGREES: f64 = 0.0;

// --- Cross-process mirror ---

/// Identifier the persisted mirror is keyed by. Hook processes resolve the
/// same directory from it without talking to the writer.
pub const DEFAULT_APP_ID: &str = "io.routemock.motion";
/// File name of the persisted broadcast snapshot inside the app directory.
pub const STORE_FILE_NAME: &str = "motion_state.json";
/// Default reader debounce: zero means re-read the file on every query.
pub const DEFAULT_RELOAD_DEBOUNCE_MS: u64 = 0;
/// Snapshots older than this are treated as "motion ended" by hook providers.
pub const DEFAULT_STALE_AFTER_MS: u64 = 30_000;

// --- Hook consumers ---

/// Horizontal accuracy (meters) reported with spoofed fixes.
pub const SPOOFED_ACCURACY_METERS: f32 = 4.0;
/// Peak accelerometer vibration (m/s²) at `MAX_SPEED_KMH`.
pub const VIBRATION_AT_MAX_SPEED: f32 = 1.2;
/// Lateral load (m/s²) applied at the sharpest curve reduction.
pub const MAX_LATERAL_LOAD: f32 = 3.5;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;
