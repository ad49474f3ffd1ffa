//! Watches the motion snapshot the way an intercepted app would see it.

use routemock::config::SyncConfig;
use routemock::hooks::{LocationValueProvider, SpoofedLocationProvider};
use routemock::sync::{BroadcastSource, FileSyncReader};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "routemock=info,monitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv::dotenv().ok();
    let config = SyncConfig::from_env().map_err(|e| format!("Failed to load configuration: {}", e))?;

    let reader = Arc::new(FileSyncReader::for_config(&config));
    let location = SpoofedLocationProvider::new(reader.clone(), config.stale_after);
    tracing::info!(path = %reader.path().display(), "Monitoring motion snapshot");

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let state = reader.snapshot();
                let fix = location.location();
                tracing::info!(
                    control_kmh = state.control_speed_kmh,
                    actual_kmh = state.actual_speed_kmh,
                    curve = state.curve_reduction,
                    bearing = state.bearing_degrees,
                    moving = location.is_active(),
                    lat = fix.map(|f| f.latitude),
                    lng = fix.map(|f| f.longitude),
                    "Snapshot"
                );
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    tracing::info!(reloads = reader.reload_count(), "Monitor stopped");
    Ok(())
}
