use std::path::Path;

use laserloc_icp::IcpParams;
use laserloc_scan::{conversion::CloudFilter, simulator::SimulatorParams};
use serde::{Deserialize, Serialize};

use crate::error::LocalizerError;

/// Bounds used to accept or reject a candidate pose correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateParams {
    /// Registrations with a fitness above this value are rejected.
    pub fitness_threshold: f64,
    /// Corrections moving the robot farther than this, in meters, are rejected.
    pub max_jump_distance: f64,
    /// Corrections below this distance, in meters, are insignificant.
    pub min_jump_distance: f64,
    /// Corrections rotating the robot more than this, in radians, are rejected.
    pub max_rotation: f64,
    /// Corrections below this rotation, in radians, are insignificant.
    pub min_rotation: f64,
    /// Minimum time in seconds between two insignificant updates.
    pub update_interval: f64,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            fitness_threshold: 0.01,
            max_jump_distance: 1.0,
            min_jump_distance: 0.02,
            max_rotation: 0.5,
            min_rotation: 0.02,
            update_interval: 1.0,
        }
    }
}

/// Diagonal of the covariance attached to every published pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseCovariance {
    /// Variance of x in square meters.
    pub xx: f64,
    /// Variance of y in square meters.
    pub yy: f64,
    /// Variance of the heading in square radians.
    pub aa: f64,
}

impl Default for PoseCovariance {
    fn default() -> Self {
        Self {
            xx: 0.05,
            yy: 0.05,
            aa: 0.03,
        }
    }
}

/// Which debug values are produced while processing a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugOutputs {
    /// Hand out the simulated scan.
    pub simulated_scan: bool,
    /// Hand out the cloud built from the simulated scan.
    pub simulated_cloud: bool,
    /// Hand out the cloud built from the real scan.
    pub laser_cloud: bool,
    /// Hand out the real cloud moved by the registration result.
    pub transformed_laser_cloud: bool,
}

impl DebugOutputs {
    /// Every debug output enabled.
    pub fn all() -> Self {
        Self {
            simulated_scan: true,
            simulated_cloud: true,
            laser_cloud: true,
            transformed_laser_cloud: true,
        }
    }
}

/// Complete configuration of the localizer.
///
/// Every field has a default, so partial JSON documents are accepted:
///
/// ```
/// use laserloc_localizer::LocalizerConfig;
///
/// let config = LocalizerConfig::from_json_str(r#"{ "gate": { "update_interval": 0.5 } }"#).unwrap();
/// assert_eq!(config.gate.update_interval, 0.5);
/// assert_eq!(config.icp.max_iterations, 100);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerConfig {
    /// Registration parameters.
    pub icp: IcpParams,
    /// Pose update bounds.
    pub gate: GateParams,
    /// Covariance of the published pose.
    pub covariance: PoseCovariance,
    /// Filter of the simulated cloud. Its distance also caps the simulated beams.
    pub simulated_cloud: CloudFilter,
    /// Filter of the real cloud.
    pub laser_cloud: CloudFilter,
    /// Obstacle classification of the map cells.
    pub simulator: SimulatorParams,
    /// Debug values to produce.
    pub debug: DebugOutputs,
}

impl LocalizerConfig {
    /// Parse and validate a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, LocalizerError> {
        let config: LocalizerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LocalizerError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), LocalizerError> {
        let icp = &self.icp;
        positive("icp.max_correspondence_distance", icp.max_correspondence_distance)?;
        positive("icp.inlier_distance", icp.inlier_distance)?;
        non_negative("icp.transformation_epsilon", icp.transformation_epsilon)?;
        non_negative("icp.euclidean_distance_epsilon", icp.euclidean_distance_epsilon)?;
        if icp.max_iterations == 0 {
            return Err(LocalizerError::Config(
                "icp.max_iterations must be at least 1".to_string(),
            ));
        }

        let gate = &self.gate;
        non_negative("gate.fitness_threshold", gate.fitness_threshold)?;
        non_negative("gate.min_jump_distance", gate.min_jump_distance)?;
        non_negative("gate.min_rotation", gate.min_rotation)?;
        non_negative("gate.update_interval", gate.update_interval)?;
        ordered(
            "gate.min_jump_distance",
            gate.min_jump_distance,
            "gate.max_jump_distance",
            gate.max_jump_distance,
        )?;
        ordered(
            "gate.min_rotation",
            gate.min_rotation,
            "gate.max_rotation",
            gate.max_rotation,
        )?;

        non_negative("covariance.xx", self.covariance.xx)?;
        non_negative("covariance.yy", self.covariance.yy)?;
        non_negative("covariance.aa", self.covariance.aa)?;

        positive("simulated_cloud.max_distance", self.simulated_cloud.max_distance)?;
        positive("laser_cloud.max_distance", self.laser_cloud.max_distance)?;

        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<(), LocalizerError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LocalizerError::Config(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), LocalizerError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(LocalizerError::Config(format!(
            "{name} must be non-negative, got {value}"
        )))
    }
}

fn ordered(min_name: &str, min: f64, max_name: &str, max: f64) -> Result<(), LocalizerError> {
    if min <= max {
        Ok(())
    } else {
        Err(LocalizerError::Config(format!(
            "{min_name} ({min}) exceeds {max_name} ({max})"
        )))
    }
}
