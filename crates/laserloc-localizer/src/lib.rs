#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Localizer configuration and its JSON loading.
pub mod config;
pub use config::LocalizerConfig;

mod error;
pub use error::{CloudKind, LocalizerError};

/// Pose estimate, gating of corrections and covariance assignment.
pub mod gate;

mod localizer;
pub use localizer::*;

/// Versioned storage of the current map.
pub mod map_store;
