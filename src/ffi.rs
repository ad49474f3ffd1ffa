//! C ABI for the host application (writer side) and for native hook code
//! (reader side). Every entry point returns instead of panicking: fallible
//! calls report `0` on success or a negative [`AppError::status_code`].

use crate::config::{SimulatorConfig, SyncConfig};
use crate::error::{AppError, Result};
use crate::models::Waypoint;
use crate::services::RouteSimulator;
use crate::sync::{BroadcastSource, BroadcastState, FileSyncReader, FileSyncStore};
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::runtime::Runtime;

/// Returned when an operation needs `routemock_init` / `routemock_reader_open` first.
pub const STATUS_NOT_INITIALIZED: i32 = -1;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static SIMULATOR: Mutex<Option<Arc<RouteSimulator>>> = Mutex::new(None);
static READER: Mutex<Option<Arc<FileSyncReader>>> = Mutex::new(None);

fn get_runtime() -> Result<&'static Runtime> {
    if let Some(rt) = RUNTIME.get() {
        return Ok(rt);
    }
    let rt = Runtime::new()
        .map_err(|e| AppError::Runtime(format!("Failed to create Tokio runtime: {}", e)))?;
    // Losing a concurrent init race just drops our copy.
    let _ = RUNTIME.set(rt);
    RUNTIME
        .get()
        .ok_or_else(|| AppError::Runtime("Tokio runtime unavailable".to_string()))
}

fn simulator() -> Option<Arc<RouteSimulator>> {
    SIMULATOR.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

fn reader_snapshot() -> BroadcastState {
    let reader = READER.lock().unwrap_or_else(|e| e.into_inner()).clone();
    reader
        .map(|r| r.snapshot())
        .unwrap_or(BroadcastState::NEUTRAL)
}

/// Null or empty strings read as `None`.
unsafe fn optional_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let s = unsafe { CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

unsafe fn sync_config(store_dir: *const c_char, app_id: *const c_char) -> SyncConfig {
    let defaults = SyncConfig::default();
    SyncConfig {
        store_dir: unsafe { optional_string(store_dir) }
            .map(PathBuf::from)
            .unwrap_or(defaults.store_dir),
        app_id: unsafe { optional_string(app_id) }.unwrap_or(defaults.app_id),
        ..defaults
    }
}

fn status(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "routemock call failed");
            e.status_code()
        }
    }
}

/// Create the writer: a file-backed store plus a fresh simulator. Calling it
/// again stops and replaces the previous simulator.
///
/// # Safety
///
/// `store_dir` and `app_id` must each be null or a valid null-terminated C
/// string. Null selects the default.
#[no_mangle]
pub unsafe extern "C" fn routemock_init(store_dir: *const c_char, app_id: *const c_char) -> i32 {
    let config = unsafe { sync_config(store_dir, app_id) };
    status((|| {
        get_runtime()?;
        let store = Arc::new(FileSyncStore::for_config(&config)?);
        let simulator = Arc::new(RouteSimulator::new(store, SimulatorConfig::default()));
        let previous = SIMULATOR
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(simulator);
        drop(previous);
        tracing::info!(path = %config.store_file().display(), "routemock initialized");
        Ok(())
    })())
}

/// Load `len` waypoints from `coords`, laid out as `[lat0, lng0, lat1, lng1, ...]`.
///
/// # Safety
///
/// `coords` must point to at least `2 * len` readable `f64` values, or be null
/// when `len` is zero.
#[no_mangle]
pub unsafe extern "C" fn routemock_load_route(coords: *const f64, len: usize) -> i32 {
    let Some(simulator) = simulator() else {
        return STATUS_NOT_INITIALIZED;
    };
    if coords.is_null() && len > 0 {
        return AppError::InvalidRoute("null coordinate buffer".to_string()).status_code();
    }

    let raw: &[f64] = if len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(coords, len * 2) }
    };
    let waypoints: Result<Vec<Waypoint>> = raw
        .chunks_exact(2)
        .map(|pair| Waypoint::new(pair[0], pair[1]))
        .collect();

    status(waypoints.map(|waypoints| simulator.load_route(waypoints)))
}

struct UserData(*mut c_void);

// The host owns `user_data` and promises it stays valid, and usable from the
// simulation thread, until completion or `routemock_stop`.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl UserData {
    fn get(&self) -> *mut c_void {
        self.0
    }
}

pub type PositionCallback = extern "C" fn(lat: f64, lng: f64, user_data: *mut c_void);
pub type CompleteCallback = extern "C" fn(user_data: *mut c_void);

/// Start walking the loaded route. Callbacks run on a runtime worker thread.
/// Returns an error status when the route is unusable.
///
/// # Safety
///
/// `user_data` is passed back verbatim and must stay valid while the
/// simulation runs.
#[no_mangle]
pub unsafe extern "C" fn routemock_start(
    on_position: Option<PositionCallback>,
    on_complete: Option<CompleteCallback>,
    user_data: *mut c_void,
) -> i32 {
    let Some(simulator) = simulator() else {
        return STATUS_NOT_INITIALIZED;
    };
    let rt = match get_runtime() {
        Ok(rt) => rt,
        Err(e) => return status(Err(e)),
    };

    let data = Arc::new(UserData(user_data));
    let position_data = data.clone();
    let _guard = rt.enter();
    simulator.start(
        move |wp: Waypoint| {
            if let Some(cb) = on_position {
                cb(wp.lat, wp.lng, position_data.get());
            }
        },
        move || {
            if let Some(cb) = on_complete {
                cb(data.get());
            }
        },
    );

    if simulator.is_running() {
        0
    } else {
        AppError::InvalidRoute("route rejected, see logs".to_string()).status_code()
    }
}

#[no_mangle]
pub extern "C" fn routemock_pause() {
    if let Some(simulator) = simulator() {
        simulator.pause();
    }
}

#[no_mangle]
pub extern "C" fn routemock_resume() {
    if let Some(simulator) = simulator() {
        simulator.resume();
    }
}

#[no_mangle]
pub extern "C" fn routemock_stop() {
    if let Some(simulator) = simulator() {
        simulator.stop();
    }
}

#[no_mangle]
pub extern "C" fn routemock_set_speed(kmh: f64) {
    if let Some(simulator) = simulator() {
        simulator.set_speed(kmh);
    }
}

#[no_mangle]
pub extern "C" fn routemock_get_speed() -> f64 {
    simulator().map(|s| s.speed()).unwrap_or(0.0)
}

/// 1 while a simulation is running (including paused), 0 otherwise.
#[no_mangle]
pub extern "C" fn routemock_is_running() -> i32 {
    simulator().map(|s| s.is_running() as i32).unwrap_or(0)
}

/// Stop the simulator and drop both writer and reader state.
#[no_mangle]
pub extern "C" fn routemock_shutdown() {
    let simulator = SIMULATOR.lock().unwrap_or_else(|e| e.into_inner()).take();
    drop(simulator);
    READER.lock().unwrap_or_else(|e| e.into_inner()).take();
}

/// Open the reader used by the `routemock_get_*` functions. Until it is
/// opened they report neutral values.
///
/// # Safety
///
/// Same string contract as [`routemock_init`].
#[no_mangle]
pub unsafe extern "C" fn routemock_reader_open(
    store_dir: *const c_char,
    app_id: *const c_char,
    debounce_ms: u64,
) -> i32 {
    let config = SyncConfig {
        reload_debounce: Duration::from_millis(debounce_ms),
        ..unsafe { sync_config(store_dir, app_id) }
    };
    let reader = Arc::new(FileSyncReader::for_config(&config));
    tracing::debug!(path = %reader.path().display(), "Motion reader opened");
    *READER.lock().unwrap_or_else(|e| e.into_inner()) = Some(reader);
    0
}

#[no_mangle]
pub extern "C" fn routemock_get_control_speed() -> f64 {
    reader_snapshot().control_speed_kmh
}

#[no_mangle]
pub extern "C" fn routemock_get_actual_speed() -> f64 {
    reader_snapshot().actual_speed_kmh
}

#[no_mangle]
pub extern "C" fn routemock_get_curve_reduction() -> f64 {
    reader_snapshot().curve_reduction
}

#[no_mangle]
pub extern "C" fn routemock_get_bearing() -> f64 {
    reader_snapshot().bearing_degrees
}

/// Writes the last published position and returns 1, or returns 0 when none
/// is available.
///
/// # Safety
///
/// `out_lat` and `out_lng` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn routemock_get_position(out_lat: *mut f64, out_lng: *mut f64) -> i32 {
    if out_lat.is_null() || out_lng.is_null() {
        return 0;
    }
    match reader_snapshot().position {
        Some(p) => {
            unsafe {
                *out_lat = p.lat;
                *out_lng = p.lng;
            }
            1
        }
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::ffi::CString;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    static POSITIONS: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn count_position(_lat: f64, _lng: f64, user_data: *mut c_void) {
        let counter = unsafe { &*(user_data as *const AtomicUsize) };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn init_in(dir: &TempDir) -> CString {
        let store_dir = CString::new(dir.path().to_string_lossy().into_owned()).unwrap();
        let app_id = CString::new("io.routemock.ffi").unwrap();
        assert_eq!(unsafe { routemock_init(store_dir.as_ptr(), app_id.as_ptr()) }, 0);
        assert_eq!(
            unsafe { routemock_reader_open(store_dir.as_ptr(), app_id.as_ptr(), 0) },
            0
        );
        store_dir
    }

    #[test]
    #[serial]
    fn calls_before_init_are_harmless() {
        routemock_shutdown();
        routemock_pause();
        routemock_set_speed(50.0);
        assert_eq!(routemock_is_running(), 0);
        assert_eq!(routemock_get_speed(), 0.0);
        assert_eq!(routemock_get_actual_speed(), 0.0);
        assert_eq!(routemock_get_curve_reduction(), 1.0);
        assert_eq!(
            unsafe { routemock_start(None, None, std::ptr::null_mut()) },
            STATUS_NOT_INITIALIZED
        );
    }

    #[test]
    #[serial]
    fn rejects_invalid_routes() {
        let dir = TempDir::new().unwrap();
        let _store_dir = init_in(&dir);

        let out_of_range = [95.0, 0.0, 0.0, 1.0];
        assert_eq!(
            unsafe { routemock_load_route(out_of_range.as_ptr(), 2) },
            AppError::InvalidCoordinates(String::new()).status_code()
        );

        let single = [1.0, 1.0];
        assert_eq!(unsafe { routemock_load_route(single.as_ptr(), 1) }, 0);
        assert!(unsafe { routemock_start(None, None, std::ptr::null_mut()) } < 0);
        assert_eq!(routemock_is_running(), 0);
        routemock_shutdown();
    }

    #[test]
    #[serial]
    fn drives_simulation_and_reader() {
        let dir = TempDir::new().unwrap();
        let _store_dir = init_in(&dir);
        POSITIONS.store(0, Ordering::SeqCst);

        routemock_set_speed(400.0);
        assert_eq!(routemock_get_speed(), 350.0);
        assert_eq!(routemock_get_control_speed(), 350.0);
        routemock_set_speed(60.0);

        let route = [0.0, 0.0, 0.0, 0.01];
        assert_eq!(unsafe { routemock_load_route(route.as_ptr(), 2) }, 0);
        let started = unsafe {
            routemock_start(
                Some(count_position),
                None,
                &POSITIONS as *const AtomicUsize as *mut c_void,
            )
        };
        assert_eq!(started, 0);
        assert_eq!(routemock_is_running(), 1);

        std::thread::sleep(Duration::from_millis(1200));
        assert!(POSITIONS.load(Ordering::SeqCst) >= 2);
        assert!(routemock_get_actual_speed() > 0.0);
        assert!((routemock_get_bearing() - 90.0).abs() < 1.0);

        let (mut lat, mut lng) = (f64::NAN, f64::NAN);
        assert_eq!(unsafe { routemock_get_position(&mut lat, &mut lng) }, 1);
        assert!(lng > 0.0);

        routemock_stop();
        assert_eq!(routemock_is_running(), 0);
        assert_eq!(routemock_get_actual_speed(), 0.0);
        assert_eq!(routemock_get_curve_reduction(), 1.0);
        assert_eq!(routemock_get_bearing(), 0.0);
        assert_eq!(routemock_get_control_speed(), 60.0);
        routemock_shutdown();
    }
}
