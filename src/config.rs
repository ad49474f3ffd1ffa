use crate::constants::*;
use crate::error::{AppError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub route_file: Option<PathBuf>,
    pub speed_kmh: f64,
    pub simulator: SimulatorConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Lower bound for the control speed (km/h)
    pub min_speed_kmh: f64,

    /// Upper bound for the control speed (km/h)
    pub max_speed_kmh: f64,

    /// Control speed before anyone calls `set_speed` (km/h)
    pub default_speed_kmh: f64,

    /// Shortest randomized tick interval (ms)
    pub tick_min_ms: u64,

    /// Longest randomized tick interval (ms)
    pub tick_max_ms: u64,

    /// Maximum receiver-noise offset applied to emitted positions (m).
    /// Zero disables jitter.
    pub jitter_max_meters: f64,

    /// Weight of the previous curve reduction in each blend step (0.0-1.0)
    pub curve_blend_alpha: f64,

    /// Per-tick recovery toward 1.0 on the final segment
    pub curve_recovery_per_tick: f64,

    /// Segments shorter than this are skipped (m)
    pub degenerate_segment_meters: f64,

    /// Seed for tick and jitter randomness; `None` draws a fresh seed per run
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_speed_kmh: MIN_SPEED_KMH,
            max_speed_kmh: MAX_SPEED_KMH,
            default_speed_kmh: DEFAULT_SPEED_KMH,
            tick_min_ms: DEFAULT_TICK_MIN_MS,
            tick_max_ms: DEFAULT_TICK_MAX_MS,
            jitter_max_meters: DEFAULT_JITTER_MAX_METERS,
            curve_blend_alpha: DEFAULT_CURVE_BLEND_ALPHA,
            curve_recovery_per_tick: DEFAULT_CURVE_RECOVERY_PER_TICK,
            degenerate_segment_meters: DEFAULT_DEGENERATE_SEGMENT_METERS,
            seed: None,
        }
    }
}

/// Read `key`, falling back to `default` when unset.
fn env_or<T: FromStr + ToString>(key: &str, default: T) -> Result<T> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| AppError::Config(format!("Invalid {}", key)))
}

impl SimulatorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let seed = match env::var("SIM_SEED") {
            Ok(raw) => Some(
                raw.parse()
                    .map_err(|_| AppError::Config("Invalid SIM_SEED".to_string()))?,
            ),
            Err(_) => None,
        };

        let config = Self {
            min_speed_kmh: env_or("SIM_MIN_SPEED_KMH", defaults.min_speed_kmh)?,
            max_speed_kmh: env_or("SIM_MAX_SPEED_KMH", defaults.max_speed_kmh)?,
            default_speed_kmh: env_or("SIM_DEFAULT_SPEED_KMH", defaults.default_speed_kmh)?,
            tick_min_ms: env_or("SIM_TICK_MIN_MS", defaults.tick_min_ms)?,
            tick_max_ms: env_or("SIM_TICK_MAX_MS", defaults.tick_max_ms)?,
            jitter_max_meters: env_or("SIM_JITTER_MAX_METERS", defaults.jitter_max_meters)?,
            curve_blend_alpha: env_or("SIM_CURVE_BLEND_ALPHA", defaults.curve_blend_alpha)?,
            curve_recovery_per_tick: env_or(
                "SIM_CURVE_RECOVERY_PER_TICK",
                defaults.curve_recovery_per_tick,
            )?,
            degenerate_segment_meters: env_or(
                "SIM_DEGENERATE_SEGMENT_METERS",
                defaults.degenerate_segment_meters,
            )?,
            seed,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // The store clamps to [MIN_SPEED_KMH, MAX_SPEED_KMH]; a wider range would
        // let the loop and hook consumers disagree on the control speed.
        if !(self.min_speed_kmh >= MIN_SPEED_KMH
            && self.max_speed_kmh <= MAX_SPEED_KMH
            && self.min_speed_kmh <= self.max_speed_kmh)
        {
            return Err(AppError::Config(format!(
                "speed range [{}, {}] is invalid (must lie within [{}, {}])",
                self.min_speed_kmh, self.max_speed_kmh, MIN_SPEED_KMH, MAX_SPEED_KMH
            )));
        }
        if self.tick_min_ms == 0 || self.tick_min_ms > self.tick_max_ms {
            return Err(AppError::Config(format!(
                "tick band [{}ms, {}ms] is invalid",
                self.tick_min_ms, self.tick_max_ms
            )));
        }
        if !(0.0..=50.0).contains(&self.jitter_max_meters) {
            return Err(AppError::Config(
                "SIM_JITTER_MAX_METERS must be between 0 and 50".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.curve_blend_alpha) {
            return Err(AppError::Config(
                "SIM_CURVE_BLEND_ALPHA must be in [0, 1)".to_string(),
            ));
        }
        if !(self.curve_recovery_per_tick > 0.0 && self.curve_recovery_per_tick <= 1.0) {
            return Err(AppError::Config(
                "SIM_CURVE_RECOVERY_PER_TICK must be in (0, 1]".to_string(),
            ));
        }
        if !(self.degenerate_segment_meters >= 0.0) {
            return Err(AppError::Config(
                "SIM_DEGENERATE_SEGMENT_METERS must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Force every field into the domain `validate` accepts. NaN falls back to
    /// the default.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let bound = |value: f64, lo: f64, hi: f64, fallback: f64| {
            if value.is_nan() {
                fallback
            } else {
                value.clamp(lo, hi)
            }
        };

        let mut min_speed = bound(self.min_speed_kmh, MIN_SPEED_KMH, MAX_SPEED_KMH, defaults.min_speed_kmh);
        let mut max_speed = bound(self.max_speed_kmh, MIN_SPEED_KMH, MAX_SPEED_KMH, defaults.max_speed_kmh);
        if min_speed > max_speed {
            std::mem::swap(&mut min_speed, &mut max_speed);
        }
        let tick_min_ms = self.tick_min_ms.max(1);

        Self {
            min_speed_kmh: min_speed,
            max_speed_kmh: max_speed,
            default_speed_kmh: bound(
                self.default_speed_kmh,
                min_speed,
                max_speed,
                defaults.default_speed_kmh.clamp(min_speed, max_speed),
            ),
            tick_min_ms,
            tick_max_ms: self.tick_max_ms.max(tick_min_ms),
            jitter_max_meters: bound(self.jitter_max_meters, 0.0, 50.0, defaults.jitter_max_meters),
            curve_blend_alpha: bound(self.curve_blend_alpha, 0.0, 0.99, defaults.curve_blend_alpha),
            curve_recovery_per_tick: bound(
                self.curve_recovery_per_tick,
                0.01,
                1.0,
                defaults.curve_recovery_per_tick,
            ),
            degenerate_segment_meters: bound(
                self.degenerate_segment_meters,
                0.0,
                f64::MAX,
                defaults.degenerate_segment_meters,
            ),
            seed: self.seed,
        }
    }

    pub fn tick_band(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.tick_min_ms),
            Duration::from_millis(self.tick_max_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Directory holding one sub-directory per application identifier
    pub store_dir: PathBuf,

    /// Identifier both writer and hook processes derive the mirror path from
    pub app_id: String,

    /// Reader-side re-read debounce; zero re-reads on every query
    pub reload_debounce: Duration,

    /// Age after which hook providers treat a snapshot as "motion ended"
    pub stale_after: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_dir: env::temp_dir().join("routemock"),
            app_id: DEFAULT_APP_ID.to_string(),
            reload_debounce: Duration::from_millis(DEFAULT_RELOAD_DEBOUNCE_MS),
            stale_after: Duration::from_millis(DEFAULT_STALE_AFTER_MS),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            store_dir: env::var("SYNC_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            app_id: env::var("SYNC_APP_ID").unwrap_or(defaults.app_id),
            reload_debounce: Duration::from_millis(env_or(
                "SYNC_RELOAD_DEBOUNCE_MS",
                DEFAULT_RELOAD_DEBOUNCE_MS,
            )?),
            stale_after: Duration::from_millis(env_or(
                "SYNC_STALE_AFTER_MS",
                DEFAULT_STALE_AFTER_MS,
            )?),
        })
    }

    /// Path of the persisted snapshot for this app identifier.
    pub fn store_file(&self) -> PathBuf {
        self.store_dir.join(&self.app_id).join(STORE_FILE_NAME)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let simulator = SimulatorConfig::from_env()?;
        let speed_kmh: f64 = env_or("SPEED_KMH", simulator.default_speed_kmh)?;

        Ok(Config {
            route_file: env::var("ROUTE_FILE").ok().map(PathBuf::from),
            speed_kmh,
            simulator,
            sync: SyncConfig::from_env()?,
        })
    }
}
