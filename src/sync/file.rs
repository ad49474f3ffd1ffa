use crate::config::SyncConfig;
use crate::error::{AppError, Result};
use crate::models::Waypoint;
use crate::sync::{BroadcastSource, BroadcastState, MemorySyncStore, SynchronizationStore};
use moka::sync::Cache;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Writer-side store: an in-process fast path mirrored to a JSON snapshot file
/// that hook processes read with [`FileSyncReader`].
///
/// Every write replaces the file via rename, so readers see either the previous
/// snapshot or the new one, never a mix of both.
pub struct FileSyncStore {
    path: PathBuf,
    fast: MemorySyncStore,
    // Serializes modify+persist so the file never lags behind an older write.
    io_lock: Mutex<()>,
    persist_failures: AtomicU64,
}

impl FileSyncStore {
    /// Open (or create) the mirror at `path`.
    ///
    /// A snapshot left behind by a previous writer keeps its control speed and
    /// position but has its motion fields neutralized immediately, so a crashed
    /// run does not leave phantom motion for readers.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Store(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let previous = match read_snapshot(&path) {
            Ok(Some(state)) => state,
            Ok(None) => BroadcastState::NEUTRAL,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable store snapshot");
                BroadcastState::NEUTRAL
            }
        };

        let store = FileSyncStore {
            fast: MemorySyncStore::with_state(previous.at_rest()),
            path,
            io_lock: Mutex::new(()),
            persist_failures: AtomicU64::new(0),
        };
        write_snapshot(&store.path, &store.fast.snapshot())?;

        tracing::info!(path = %store.path.display(), "File sync store ready");
        Ok(store)
    }

    pub fn for_config(config: &SyncConfig) -> Result<Self> {
        Self::new(config.store_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist attempts that failed since creation. The in-process value is
    /// still updated when persisting fails.
    pub fn persist_failures(&self) -> u64 {
        self.persist_failures.load(Ordering::Relaxed)
    }

    // Blocking std::fs I/O, called from the simulator task while it holds the
    // tick gate. One small file replacement per tick (about 3 Hz) is cheap
    // enough to stay inline; `block_in_place` is not an option because tests
    // drive the loop on a current-thread runtime.
    fn write_through(&self, f: impl FnOnce(&MemorySyncStore)) {
        let _guard = self.io_lock.lock().unwrap_or_else(|e| e.into_inner());
        f(&self.fast);
        let state = self.fast.snapshot();
        if let Err(e) = write_snapshot(&self.path, &state) {
            self.persist_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist motion snapshot");
        }
    }
}

impl BroadcastSource for FileSyncStore {
    fn snapshot(&self) -> BroadcastState {
        self.fast.snapshot()
    }
}

impl SynchronizationStore for FileSyncStore {
    fn set_control_speed(&self, kmh: f64) {
        self.write_through(|fast| fast.set_control_speed(kmh));
    }

    fn update_actual_speed(&self, kmh: f64) {
        self.write_through(|fast| fast.update_actual_speed(kmh));
    }

    fn update_curve_reduction(&self, factor: f64) {
        self.write_through(|fast| fast.update_curve_reduction(factor));
    }

    fn update_bearing(&self, degrees: f64) {
        self.write_through(|fast| fast.update_bearing(degrees));
    }

    fn update_position(&self, position: Waypoint) {
        self.write_through(|fast| fast.update_position(position));
    }

    fn publish(&self, state: BroadcastState) {
        self.write_through(|fast| fast.publish(state));
    }

    fn reset(&self) {
        self.write_through(|fast| fast.reset());
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

/// Reader-side handle for hook processes.
///
/// Re-reads the snapshot file on every query, or at most once per `debounce`
/// when one is configured. A missing file reads as neutral; an unreadable one
/// falls back to the last snapshot that parsed.
pub struct FileSyncReader {
    path: PathBuf,
    debounced: Option<Cache<(), BroadcastState>>,
    last_good: Mutex<BroadcastState>,
    reloads: AtomicU64,
}

impl FileSyncReader {
    pub fn new(path: impl Into<PathBuf>, debounce: Duration) -> Self {
        let debounced = (!debounce.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1)
                .time_to_live(debounce)
                .build()
        });

        FileSyncReader {
            path: path.into(),
            debounced,
            last_good: Mutex::new(BroadcastState::NEUTRAL),
            reloads: AtomicU64::new(0),
        }
    }

    pub fn for_config(config: &SyncConfig) -> Self {
        Self::new(config.store_file(), config.reload_debounce)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of times the file was actually read.
    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    fn reload(&self) -> BroadcastState {
        self.reloads.fetch_add(1, Ordering::Relaxed);
        let mut last_good = self.last_good.lock().unwrap_or_else(|e| e.into_inner());

        match read_snapshot(&self.path) {
            Ok(Some(state)) => {
                *last_good = state;
                state
            }
            Ok(None) => {
                *last_good = BroadcastState::NEUTRAL;
                BroadcastState::NEUTRAL
            }
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Using last good motion snapshot");
                *last_good
            }
        }
    }
}

impl BroadcastSource for FileSyncReader {
    fn snapshot(&self) -> BroadcastState {
        match &self.debounced {
            Some(cache) => cache.get_with((), || self.reload()),
            None => self.reload(),
        }
    }
}

/// `Ok(None)` when no snapshot exists yet.
fn read_snapshot(path: &Path) -> Result<Option<BroadcastState>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let state: BroadcastState = serde_json::from_str(&content)?;
    Ok(Some(state.sanitized()))
}

fn write_snapshot(path: &Path, state: &BroadcastState) -> Result<()> {
    let json = serde_json::to_string(state)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    make_world_readable(&tmp)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// Hook code runs under other app UIDs and needs read access.
#[cfg(unix)]
fn make_world_readable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_world_readable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("io.routemock.test").join("motion_state.json")
    }

    #[test]
    fn creates_directory_and_neutral_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        let store = FileSyncStore::new(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.backend_name(), "file");

        let reader = FileSyncReader::new(&path, Duration::ZERO);
        let state = reader.snapshot();
        assert_eq!(state.actual_speed_kmh, 0.0);
        assert_eq!(state.curve_reduction, 1.0);
        assert_eq!(state.bearing_degrees, 0.0);
    }

    #[test]
    fn reader_without_file_returns_neutral() {
        let dir = TempDir::new().unwrap();
        let reader = FileSyncReader::new(store_path(&dir), Duration::ZERO);
        assert_eq!(reader.snapshot(), BroadcastState::NEUTRAL);
        assert_eq!(reader.get_actual_speed(), 0.0);
    }

    #[test]
    fn writes_are_visible_to_independent_reader() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let store = FileSyncStore::new(&path).unwrap();
        let reader = FileSyncReader::new(&path, Duration::ZERO);

        store.set_control_speed(60.0);
        store.update_actual_speed(39.0);
        store.update_curve_reduction(0.65);
        store.update_bearing(370.0);

        assert_eq!(reader.get_control_speed(), 60.0);
        assert_eq!(reader.get_actual_speed(), 39.0);
        assert_eq!(reader.get_curve_reduction(), 0.65);
        assert_eq!(reader.get_bearing(), 10.0);
        assert_eq!(store.persist_failures(), 0);
    }

    #[test]
    fn reopening_neutralizes_leftover_motion() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        {
            let store = FileSyncStore::new(&path).unwrap();
            store.set_control_speed(70.0);
            store.update_actual_speed(70.0);
            store.update_bearing(45.0);
        }

        let store = FileSyncStore::new(&path).unwrap();
        assert_eq!(store.get_control_speed(), 70.0);
        assert_eq!(store.get_actual_speed(), 0.0);
        assert_eq!(store.get_bearing(), 0.0);
    }

    #[test]
    fn corrupt_file_falls_back_to_last_good() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let store = FileSyncStore::new(&path).unwrap();
        store.update_actual_speed(25.0);

        let reader = FileSyncReader::new(&path, Duration::ZERO);
        assert_eq!(reader.get_actual_speed(), 25.0);

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(reader.get_actual_speed(), 25.0);
        assert_eq!(reader.reload_count(), 2);
    }

    #[test]
    fn debounced_reader_skips_rereads() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let store = FileSyncStore::new(&path).unwrap();
        store.update_actual_speed(12.0);

        let reader = FileSyncReader::new(&path, Duration::from_secs(60));
        assert_eq!(reader.get_actual_speed(), 12.0);

        store.update_actual_speed(30.0);
        // Still inside the debounce window
        assert_eq!(reader.get_actual_speed(), 12.0);
        assert_eq!(reader.reload_count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn snapshot_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        FileSyncStore::new(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
