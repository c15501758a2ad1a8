use laserloc_3d::{
    ops::{angle_difference, euclidean_distance},
    transforms::RigidTransform,
};

use crate::config::{GateParams, PoseCovariance};

/// Current best pose of the robot in the map frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    /// Pose of the robot base in the map frame.
    pub pose: RigidTransform,
    /// Time in seconds of the last accepted update, if any.
    pub last_update: Option<f64>,
}

impl Default for PoseEstimate {
    fn default() -> Self {
        Self {
            pose: RigidTransform::IDENTITY,
            last_update: None,
        }
    }
}

/// An accepted pose paired with the configured covariance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseWithCovariance {
    /// Pose of the robot base in the map frame.
    pub pose: RigidTransform,
    /// Time in seconds the pose was accepted at.
    pub stamp: f64,
    /// Diagonal covariance of x, y and heading.
    pub covariance: PoseCovariance,
}

impl PoseWithCovariance {
    /// Row-major 6x6 covariance over `(x, y, z, roll, pitch, yaw)`.
    pub fn covariance_matrix(&self) -> [[f64; 6]; 6] {
        let mut matrix = [[0.0; 6]; 6];
        matrix[0][0] = self.covariance.xx;
        matrix[1][1] = self.covariance.yy;
        matrix[5][5] = self.covariance.aa;
        matrix
    }
}

/// Attach the fixed covariance to a pose.
pub fn assign_covariance(
    pose: &RigidTransform,
    stamp: f64,
    covariance: &PoseCovariance,
) -> PoseWithCovariance {
    PoseWithCovariance {
        pose: *pose,
        stamp,
        covariance: *covariance,
    }
}

/// Why a candidate correction was not applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// The registration fitness is above the threshold.
    PoorFit {
        /// Fitness of the candidate.
        fitness: f64,
    },
    /// The correction moves the robot implausibly far.
    ImplausibleJump {
        /// Translation of the correction in meters.
        translation: f64,
        /// Rotation of the correction in radians.
        rotation: f64,
    },
    /// The correction is too small to apply this soon after the last update.
    InsignificantAndTooSoon {
        /// Seconds since the last accepted update.
        elapsed: f64,
    },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::PoorFit { fitness } => write!(f, "poor fit ({fitness:.6})"),
            RejectReason::ImplausibleJump {
                translation,
                rotation,
            } => write!(
                f,
                "implausible jump ({translation:.3} m, {rotation:.3} rad)"
            ),
            RejectReason::InsignificantAndTooSoon { elapsed } => {
                write!(f, "insignificant change {elapsed:.3} s after last update")
            }
        }
    }
}

/// Outcome of gating a candidate correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// The correction was applied, yielding this pose.
    Accept(PoseWithCovariance),
    /// The correction was discarded.
    Reject(RejectReason),
}

impl GateDecision {
    /// Whether the correction was applied.
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accept(_))
    }
}

/// Owns the pose estimate and decides which corrections update it.
#[derive(Debug, Clone)]
pub struct PoseGatekeeper {
    estimate: PoseEstimate,
    params: GateParams,
    covariance: PoseCovariance,
}

impl PoseGatekeeper {
    /// Create a gatekeeper starting at the identity pose.
    pub fn new(params: GateParams, covariance: PoseCovariance) -> Self {
        Self {
            estimate: PoseEstimate::default(),
            params,
            covariance,
        }
    }

    /// The current estimate.
    pub fn estimate(&self) -> &PoseEstimate {
        &self.estimate
    }

    /// The current pose of the robot in the map frame.
    pub fn pose(&self) -> &RigidTransform {
        &self.estimate.pose
    }

    /// Replace the estimate with an externally provided pose.
    pub fn seed(&mut self, pose: RigidTransform, stamp: f64) {
        self.estimate = PoseEstimate {
            pose,
            last_update: Some(stamp),
        };
    }

    /// Replace the gating bounds and output covariance.
    pub fn set_params(&mut self, params: GateParams, covariance: PoseCovariance) {
        self.params = params;
        self.covariance = covariance;
    }

    /// Decide whether `candidate` corrects the current pose.
    ///
    /// The candidate is applied on the right of the current pose. Checks run
    /// in order: fitness, then the upper movement bounds, then the combination
    /// of small movement and recent update. The estimate only changes when the
    /// candidate is accepted.
    ///
    /// # Arguments
    ///
    /// * `candidate` - Correction expressed in the robot frame.
    /// * `fitness` - Registration fitness of the candidate.
    /// * `now` - Time of the scan in seconds.
    pub fn consider(&mut self, candidate: &RigidTransform, fitness: f64, now: f64) -> GateDecision {
        let params = &self.params;

        if fitness.is_nan() || fitness > params.fitness_threshold {
            return GateDecision::Reject(RejectReason::PoorFit { fitness });
        }

        let current = &self.estimate.pose;
        let corrected = current.compose(candidate);

        let translation = euclidean_distance(&current.translation, &corrected.translation);
        let rotation = angle_difference(current.yaw(), corrected.yaw());

        if translation > params.max_jump_distance || rotation > params.max_rotation {
            return GateDecision::Reject(RejectReason::ImplausibleJump {
                translation,
                rotation,
            });
        }

        let elapsed = self
            .estimate
            .last_update
            .map_or(f64::INFINITY, |last| now - last);

        if translation < params.min_jump_distance
            && rotation < params.min_rotation
            && elapsed < params.update_interval
        {
            return GateDecision::Reject(RejectReason::InsignificantAndTooSoon { elapsed });
        }

        self.estimate = PoseEstimate {
            pose: corrected,
            last_update: Some(now),
        };

        GateDecision::Accept(assign_covariance(&corrected, now, &self.covariance))
    }
}
