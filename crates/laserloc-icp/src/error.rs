/// Error types for the registration module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum IcpError {
    /// One of the input clouds is too small to estimate a transform.
    #[error("Not enough points for registration: source {source_len}, target {target_len}, need {required}")]
    NotEnoughPoints {
        /// Number of source points.
        source_len: usize,
        /// Number of target points.
        target_len: usize,
        /// Minimum number of points per cloud.
        required: usize,
    },

    /// The aligned clouds do not overlap enough to score the result.
    #[error("Registration found {found} inliers, at least {required} are required")]
    InsufficientInliers {
        /// Number of inlier correspondences.
        found: usize,
        /// Configured minimum inlier count.
        required: usize,
    },
}
