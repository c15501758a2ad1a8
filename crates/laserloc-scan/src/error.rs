/// Error types for the scan module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ScanError {
    /// Fewer points than required survived filtering.
    #[error("Point cloud has {found} points, at least {required} are required")]
    InsufficientPoints {
        /// Number of points after filtering.
        found: usize,
        /// Configured minimum point count.
        required: usize,
    },

    /// The scan angles do not describe a valid sweep.
    #[error("Invalid angular range: min {angle_min}, max {angle_max}, increment {angle_increment}")]
    InvalidAngularRange {
        /// First beam angle.
        angle_min: f64,
        /// Last beam angle.
        angle_max: f64,
        /// Angle between beams.
        angle_increment: f64,
    },

    /// The grid data length does not match its dimensions.
    #[error("Grid data length ({found}) does not match the grid size ({expected})")]
    InvalidGrid {
        /// width * height, `usize::MAX` when the product overflows.
        expected: usize,
        /// Length of the cell buffer.
        found: usize,
    },

    /// The grid resolution is not a positive finite number.
    #[error("Invalid grid resolution: {0}")]
    InvalidResolution(f64),
}
