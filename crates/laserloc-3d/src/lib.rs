#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Linear algebra utilities.
pub mod linalg;

/// Scalar geometry operations.
pub mod ops;

/// Point cloud container.
pub mod pointcloud;

/// Rigid transforms.
pub mod transforms;
