#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod error;
pub use error::IcpError;

mod icp_vanilla;
pub use icp_vanilla::*;

mod ops;
pub use ops::{compute_fitness, fit_transformation};
