pub mod motion;

pub use motion::{RouteSimulator, SimulationProgress};
