use routemock::hooks::{
    LocationValueProvider, SensorKind, SensorValueProvider, SpoofedLocationProvider,
    SpoofedSensorProvider,
};
use routemock::services::RouteSimulator;
use routemock::sync::{BroadcastSource, BroadcastState, FileSyncReader, FileSyncStore, SynchronizationStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;

mod common;
use common::{quiet_config, wp};

fn snapshot_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("io.routemock.it").join("motion_state.json")
}

#[tokio::test(start_paused = true)]
async fn test_reader_follows_simulation_through_file() {
    let dir = TempDir::new().unwrap();
    let path = snapshot_path(&dir);
    let store = Arc::new(FileSyncStore::new(&path).unwrap());
    // Stands in for a hook process: no shared memory with the writer
    let reader = Arc::new(FileSyncReader::new(&path, Duration::ZERO));

    let simulator = RouteSimulator::new(store.clone(), quiet_config());
    simulator.set_speed(72.0);
    assert_eq!(reader.get_control_speed(), 72.0);
    assert_eq!(reader.get_actual_speed(), 0.0);

    simulator.load_route(vec![wp(0.0, 0.0), wp(0.0, 0.01)]);
    simulator.start(|_| {}, || {});
    tokio::time::sleep(Duration::from_secs(2)).await;

    let moving = reader.snapshot();
    assert!(moving.actual_speed_kmh > 0.0);
    assert!((moving.bearing_degrees - 90.0).abs() < 0.5);
    assert!(moving.position.unwrap().lng > 0.0);

    let location = SpoofedLocationProvider::new(reader.clone(), Duration::from_secs(30));
    assert!(location.is_active());
    assert!((location.speed_mps() - 20.0).abs() < 0.01);

    simulator.stop();
    let rest = reader.snapshot();
    assert_eq!(rest.actual_speed_kmh, 0.0);
    assert_eq!(rest.curve_reduction, 1.0);
    assert_eq!(rest.bearing_degrees, 0.0);
    assert_eq!(rest.control_speed_kmh, 72.0);
    assert!(!location.is_active());
    assert_eq!(store.persist_failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_completion_parks_reader_at_destination() {
    let dir = TempDir::new().unwrap();
    let path = snapshot_path(&dir);
    let store = Arc::new(FileSyncStore::new(&path).unwrap());
    let reader = Arc::new(FileSyncReader::new(&path, Duration::ZERO));

    let simulator = RouteSimulator::new(store, quiet_config());
    let destination = wp(0.0005, 0.0);
    simulator.load_route(vec![wp(0.0, 0.0), destination]);

    let (tx, rx) = oneshot::channel();
    simulator.start(|_| {}, move || {
        let _ = tx.send(());
    });
    rx.await.unwrap();

    let parked = reader.snapshot();
    assert!(!parked.is_moving());
    assert_eq!(parked.position, Some(destination));

    let fix = SpoofedLocationProvider::new(reader, Duration::from_secs(30))
        .location()
        .unwrap();
    assert_eq!(fix.speed_mps, 0.0);
    assert_eq!((fix.latitude, fix.longitude), (destination.lat, destination.lng));
}

#[test]
fn test_new_writer_clears_leftover_motion() {
    let dir = TempDir::new().unwrap();
    let path = snapshot_path(&dir);

    {
        let crashed = FileSyncStore::new(&path).unwrap();
        crashed.publish(BroadcastState {
            control_speed_kmh: 90.0,
            actual_speed_kmh: 63.0,
            curve_reduction: 0.7,
            bearing_degrees: 180.0,
            position: Some(wp(10.0, 10.0)),
            updated_at_ms: 0,
        });
        // Dropped without reset, as if the writer process died
    }

    let reader = FileSyncReader::new(&path, Duration::ZERO);
    assert_eq!(reader.get_actual_speed(), 63.0);

    let _store = FileSyncStore::new(&path).unwrap();
    let state = reader.snapshot();
    assert_eq!(state.actual_speed_kmh, 0.0);
    assert_eq!(state.curve_reduction, 1.0);
    assert_eq!(state.bearing_degrees, 0.0);
    assert_eq!(state.control_speed_kmh, 90.0);
    assert_eq!(state.position, Some(wp(10.0, 10.0)));
}

#[test]
fn test_restarted_simulator_keeps_persisted_speed() {
    let dir = TempDir::new().unwrap();
    let path = snapshot_path(&dir);

    {
        let store = Arc::new(FileSyncStore::new(&path).unwrap());
        let simulator = RouteSimulator::new(store, quiet_config());
        simulator.set_speed(110.0);
    }

    let store = Arc::new(FileSyncStore::new(&path).unwrap());
    let simulator = RouteSimulator::new(store, quiet_config());
    assert_eq!(simulator.speed(), 110.0);
}

#[test]
fn test_debounced_reader_reuses_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = snapshot_path(&dir);
    let store = FileSyncStore::new(&path).unwrap();
    let reader = FileSyncReader::new(&path, Duration::from_secs(3600));

    store.set_control_speed(30.0);
    assert_eq!(reader.get_control_speed(), 30.0);
    store.set_control_speed(45.0);
    assert_eq!(reader.get_control_speed(), 30.0);
    assert_eq!(reader.reload_count(), 1);

    let eager = FileSyncReader::new(&path, Duration::ZERO);
    assert_eq!(eager.get_control_speed(), 45.0);
}

#[test]
fn test_sensor_hooks_read_through_file() {
    let dir = TempDir::new().unwrap();
    let path = snapshot_path(&dir);
    let store = FileSyncStore::new(&path).unwrap();
    let reader = Arc::new(FileSyncReader::new(&path, Duration::ZERO));
    let sensors = SpoofedSensorProvider::with_seed(reader, Duration::from_secs(30), 3);

    let mut field = [0.0_f32, 40.0, -20.0];
    sensors.adjust(SensorKind::MagneticField, &mut field);
    assert_eq!(field, [0.0, 40.0, -20.0]);

    store.publish(BroadcastState {
        control_speed_kmh: 50.0,
        actual_speed_kmh: 50.0,
        curve_reduction: 1.0,
        bearing_degrees: 180.0,
        position: None,
        updated_at_ms: 0,
    });
    sensors.adjust(SensorKind::MagneticField, &mut field);
    assert!(field[0].abs() < 1e-3);
    assert!((field[1] + 40.0).abs() < 1e-3);
}
