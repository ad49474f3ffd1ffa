//! Value providers for interception code running inside third-party processes.
//!
//! Nothing here assumes a particular interception mechanism: a hook calls a
//! provider from the intercepted method and substitutes whatever it returns.
//! Providers poll a [`BroadcastSource`](crate::sync::BroadcastSource) on every
//! call; they never subscribe or block.

pub mod location;
pub mod sensor;

pub use location::{LocationValueProvider, SpoofedLocation, SpoofedLocationProvider};
pub use sensor::{SensorKind, SensorValueProvider, SpoofedSensorProvider};

use crate::sync::{now_ms, BroadcastSource, BroadcastState};
use std::sync::Arc;
use std::time::Duration;

/// Snapshot as a hook should see it: motion older than `stale_after` is
/// treated as ended, so a dead writer does not leave apps moving forever.
pub(crate) fn fresh_snapshot(source: &Arc<dyn BroadcastSource>, stale_after: Duration) -> BroadcastState {
    let state = source.snapshot();
    match state.age_ms(now_ms()) {
        Some(age) if age > stale_after.as_millis() as i64 => {
            tracing::debug!(age_ms = age, "Motion snapshot is stale, reporting rest");
            state.at_rest()
        }
        _ => state,
    }
}
