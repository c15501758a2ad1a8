#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod error;
pub use error::ScanError;

/// Laser scan conversion to point clouds.
pub mod conversion;

/// Laser scan message.
pub mod laser_scan;

/// Occupancy grid map.
pub mod occupancy_grid;

/// Scan simulation by ray casting through an occupancy grid.
pub mod simulator;
