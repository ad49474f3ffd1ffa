use routemock::config::Config;
use routemock::models::Route;
use routemock::services::RouteSimulator;
use routemock::sync::{FileSyncStore, SynchronizationStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "routemock=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| format!("Failed to load configuration: {}", e))?;

    let route_file = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .or(config.route_file.clone())
        .ok_or("No route given: pass a route file or set ROUTE_FILE")?;

    tracing::info!(route = %route_file.display(), "Loading route");
    let route = Route::load(&route_file)?;
    tracing::info!(
        points = route.len(),
        length_m = %format!("{:.1}", route.total_length_m()),
        "Route loaded"
    );

    let store = Arc::new(FileSyncStore::for_config(&config.sync)?);
    tracing::info!(
        path = %store.path().display(),
        backend = store.backend_name(),
        "Publishing motion state"
    );

    let simulator = RouteSimulator::new(store.clone(), config.simulator.clone());
    simulator.set_speed(config.speed_kmh);
    simulator.load_route(route.waypoints().to_vec());

    let emitted = Arc::new(AtomicU64::new(0));
    let counter = emitted.clone();
    let (done_tx, done_rx) = oneshot::channel();
    simulator.start(
        move |position| {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::info!(n, lat = position.lat, lng = position.lng, "Position");
        },
        move || {
            let _ = done_tx.send(());
        },
    );
    if !simulator.is_running() {
        return Err("Route was rejected, see log for details".into());
    }

    tokio::select! {
        _ = done_rx => {
            tracing::info!(positions = emitted.load(Ordering::Relaxed), "Arrived at destination");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Interrupted, stopping simulation");
            simulator.stop();
        }
    }

    if store.persist_failures() > 0 {
        tracing::warn!(failures = store.persist_failures(), "Some snapshot writes failed");
    }
    Ok(())
}
