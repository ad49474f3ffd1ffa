pub mod coordinates;
pub mod route;
pub mod units;

pub use coordinates::Waypoint;
pub use route::Route;
pub use units::{DistanceMeters, SpeedKmh};
