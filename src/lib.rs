// Library exports for the desktop harness, hook consumers and the C ABI

pub mod config;
pub mod constants;
pub mod error;
pub mod ffi;
pub mod hooks;
pub mod models;
pub mod services;
pub mod sync;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Route, Waypoint};
pub use services::{RouteSimulator, SimulationProgress};
pub use sync::{BroadcastSource, BroadcastState, SynchronizationStore};
