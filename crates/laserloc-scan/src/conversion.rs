use laserloc_3d::{pointcloud::PointCloud, transforms::RigidTransform};
use serde::{Deserialize, Serialize};

use crate::{laser_scan::LaserScan, ScanError};

/// Filter applied while converting a scan into a point cloud.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudFilter {
    /// Samples farther than this distance in meters are dropped.
    pub max_distance: f64,
    /// Minimum number of points the resulting cloud must contain.
    pub min_count: usize,
}

impl Default for CloudFilter {
    fn default() -> Self {
        Self {
            max_distance: 10.0,
            min_count: 20,
        }
    }
}

/// Convert a laser scan into a point cloud.
///
/// Each usable sample is turned into a point in the sensor frame and mapped
/// into the reference frame with `sensor_pose`. Samples that are not finite,
/// fall outside `[range_min, range_max]` or lie beyond `filter.max_distance`
/// are dropped.
///
/// # Arguments
///
/// * `scan` - The laser scan.
/// * `sensor_pose` - Pose of the sensor in the reference frame.
/// * `filter` - Distance cutoff and minimum point count.
///
/// # Returns
///
/// The point cloud, or [`ScanError::InsufficientPoints`] if fewer than
/// `filter.min_count` points survive.
pub fn scan_to_pointcloud(
    scan: &LaserScan,
    sensor_pose: &RigidTransform,
    filter: &CloudFilter,
) -> Result<PointCloud, ScanError> {
    let points = scan
        .beams()
        .filter(|(_, range)| scan.is_valid_range(*range) && *range <= filter.max_distance)
        .map(|(angle, range)| {
            let (s, c) = angle.sin_cos();
            sensor_pose.transform_point(&[range * c, range * s, 0.0])
        })
        .collect::<Vec<_>>();

    log::debug!(
        "Converted scan: {} of {} samples kept",
        points.len(),
        scan.ranges.len()
    );

    if points.len() < filter.min_count {
        return Err(ScanError::InsufficientPoints {
            found: points.len(),
            required: filter.min_count,
        });
    }

    Ok(PointCloud::new(points))
}
