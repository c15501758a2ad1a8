use laserloc_3d::{linalg::transform_points, pointcloud::PointCloud, transforms::RigidTransform};
use serde::{Deserialize, Serialize};

use crate::{
    ops::{build_kdtree, find_correspondences, fit_transformation, fitness_with_kdtree},
    IcpError,
};

/// Minimum number of points or correspondences needed to fit a planar transform.
pub const MIN_POINTS: usize = 3;

/// Parameters of the registration loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpParams {
    /// Point pairs farther apart than this distance in meters are not matched.
    pub max_correspondence_distance: f64,
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Convergence threshold on the squared translation and on `1 - cos(yaw)`
    /// of the incremental transform.
    pub transformation_epsilon: f64,
    /// Convergence threshold on the change of the mean squared error between
    /// two consecutive iterations.
    pub euclidean_distance_epsilon: f64,
    /// Maximum distance in meters for a point to count when scoring the fit.
    pub inlier_distance: f64,
    /// Minimum number of inliers required to score the fit.
    pub min_inliers: usize,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_correspondence_distance: 1.0,
            max_iterations: 100,
            transformation_epsilon: 1e-8,
            euclidean_distance_epsilon: 1e-8,
            inlier_distance: 0.1,
            min_inliers: MIN_POINTS,
        }
    }
}

/// Why the registration loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The incremental transform or the error change fell below its threshold.
    Converged,
    /// The iteration budget ran out first.
    MaxIterationsReached,
    /// Too few point pairs were within the correspondence distance.
    InsufficientOverlap,
}

impl Termination {
    /// Whether the loop stopped on one of its convergence thresholds.
    pub fn has_converged(&self) -> bool {
        matches!(self, Termination::Converged)
    }
}

/// Result of the ICP algorithm.
///
/// The transformation is from the source to the target frame.
#[derive(Debug, Clone)]
pub struct ICPResult {
    /// Estimated transformation mapping source points onto the target.
    pub transform: RigidTransform,
    /// Mean squared distance of the aligned source inliers to the target.
    pub fitness: f64,
    /// Number of aligned source points within the inlier distance.
    pub num_inliers: usize,
    /// Number of correspondences used in the last iteration.
    pub num_correspondences: usize,
    /// The total number of iterations performed.
    pub num_iterations: usize,
    /// Why the loop stopped.
    pub termination: Termination,
}

/// Iterative Closest Point (ICP) algorithm using point to point distance.
///
/// Every iteration matches the current source points with their nearest
/// target points, fits the planar rigid transform of the matches and applies
/// it to the source. The estimate accumulates the incremental transforms on
/// top of `initial`.
///
/// # Arguments
///
/// * `source` - Source point cloud.
/// * `target` - Target point cloud.
/// * `initial` - Initial guess of the transformation from source to target.
/// * `params` - Matching, convergence and scoring parameters.
///
/// # Returns
///
/// * `result` - The estimated transformation, its fitness and how the loop ended.
pub fn icp_vanilla(
    source: &PointCloud,
    target: &PointCloud,
    initial: RigidTransform,
    params: &IcpParams,
) -> Result<ICPResult, IcpError> {
    if source.len() < MIN_POINTS || target.len() < MIN_POINTS {
        return Err(IcpError::NotEnoughPoints {
            source_len: source.len(),
            target_len: target.len(),
            required: MIN_POINTS,
        });
    }

    // build kdtree for target points to speed up the nearest neighbor search
    let kdtree = build_kdtree(target.points());

    // move the source with the initial guess
    let mut current_source = vec![[0.0; 3]; source.len()];
    transform_points(
        source.points(),
        &initial.rotation,
        &initial.translation,
        &mut current_source,
    );

    let mut transform = initial;
    let mut termination = Termination::MaxIterationsReached;
    let mut num_iterations = 0;
    let mut num_correspondences = 0;
    let mut prev_mse = f64::INFINITY;

    // main icp loop
    for i in 0..params.max_iterations {
        let matches = find_correspondences(
            &current_source,
            target.points(),
            &kdtree,
            params.max_correspondence_distance,
        );
        num_correspondences = matches.len();

        if matches.len() < MIN_POINTS {
            log::debug!(
                "Iteration {}: {} correspondences, stopping",
                i,
                matches.len()
            );
            termination = Termination::InsufficientOverlap;
            break;
        }

        // compute transformation between current source and closest points
        let delta = fit_transformation(&matches.points_in_src, &matches.points_in_dst);

        let mut transformed_points = vec![[0.0; 3]; current_source.len()];
        transform_points(
            &current_source,
            &delta.rotation,
            &delta.translation,
            &mut transformed_points,
        );
        current_source = transformed_points;

        // T_new = T_delta * T_old
        transform = delta.compose(&transform);
        num_iterations += 1;

        let mse = matches.mean_squared_error();
        let translation_sq = delta.translation_norm().powi(2);
        let rotation_change = 1.0 - delta.yaw().cos();

        log::debug!(
            "Iteration {}: {} correspondences, mse {:.6}, step {:.3e} m {:.3e} rad",
            i,
            matches.len(),
            mse,
            translation_sq.sqrt(),
            delta.yaw().abs()
        );

        if translation_sq <= params.transformation_epsilon
            && rotation_change <= params.transformation_epsilon
        {
            termination = Termination::Converged;
            break;
        }

        if (prev_mse - mse).abs() <= params.euclidean_distance_epsilon {
            termination = Termination::Converged;
            break;
        }

        prev_mse = mse;
    }

    let (fitness, num_inliers) =
        fitness_with_kdtree(&current_source, &kdtree, params.inlier_distance);

    let required = params.min_inliers.max(1);
    if num_inliers < required {
        return Err(IcpError::InsufficientInliers {
            found: num_inliers,
            required,
        });
    }

    log::debug!(
        "ICP finished after {} iterations ({:?}), fitness {:.6} with {} inliers",
        num_iterations,
        termination,
        fitness,
        num_inliers
    );

    Ok(ICPResult {
        transform,
        fitness,
        num_inliers,
        num_correspondences,
        num_iterations,
        termination,
    })
}

/// Align `source` onto `target` starting from the identity transform.
pub fn align(
    source: &PointCloud,
    target: &PointCloud,
    params: &IcpParams,
) -> Result<ICPResult, IcpError> {
    icp_vanilla(source, target, RigidTransform::IDENTITY, params)
}
