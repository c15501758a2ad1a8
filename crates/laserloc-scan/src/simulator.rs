use laserloc_3d::transforms::RigidTransform;
use serde::{Deserialize, Serialize};

use crate::{laser_scan::LaserScan, occupancy_grid::OccupancyGrid, ScanError};

/// Parameters deciding which cells stop a simulated beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorParams {
    /// Cells with a value at or above this threshold are obstacles.
    pub occupied_threshold: i8,
    /// Treat unknown cells as obstacles instead of free space.
    pub unknown_is_obstacle: bool,
}

impl Default for SimulatorParams {
    fn default() -> Self {
        Self {
            occupied_threshold: 65,
            unknown_is_obstacle: false,
        }
    }
}

impl SimulatorParams {
    #[inline]
    fn blocks(&self, value: i8) -> bool {
        if value < 0 {
            self.unknown_is_obstacle
        } else {
            value >= self.occupied_threshold
        }
    }
}

/// Cast a ray through the grid and return the distance to the first obstacle.
///
/// Walks the cells crossed by the ray (Amanatides & Woo voxel traversal) and
/// reports the distance at which the ray enters the first blocking cell. A
/// ray starting inside an obstacle reports `0`.
///
/// # Arguments
///
/// * `grid` - The occupancy grid.
/// * `origin` - Ray origin in the map frame.
/// * `angle` - Ray direction in the map frame, in radians.
/// * `max_range` - Maximum distance to travel, in meters.
/// * `params` - Obstacle classification.
///
/// # Returns
///
/// The hit distance in meters, or `None` if the ray leaves the grid or travels
/// `max_range` without hitting an obstacle.
pub fn cast_ray(
    grid: &OccupancyGrid,
    origin: [f64; 2],
    angle: f64,
    max_range: f64,
    params: &SimulatorParams,
) -> Option<f64> {
    let resolution = grid.resolution();
    let start = grid.world_to_grid_continuous(&origin);
    let (dy, dx) = (angle - grid.origin().yaw()).sin_cos();

    let mut cell_x = start[0].floor() as i64;
    let mut cell_y = start[1].floor() as i64;

    // distances below are in cells
    let max_t = max_range / resolution;
    let (step_x, t_delta_x, mut t_max_x) = axis_setup(start[0], cell_x, dx);
    let (step_y, t_delta_y, mut t_max_y) = axis_setup(start[1], cell_y, dy);

    let mut t = 0.0;
    loop {
        if params.blocks(grid.cell(cell_x, cell_y)?) {
            return Some(t * resolution);
        }
        if t_max_x < t_max_y {
            t = t_max_x;
            t_max_x += t_delta_x;
            cell_x += step_x;
        } else {
            t = t_max_y;
            t_max_y += t_delta_y;
            cell_y += step_y;
        }
        if t > max_t {
            return None;
        }
    }
}

/// Step direction, distance between boundaries and distance to the first boundary on one axis.
#[inline]
fn axis_setup(start: f64, cell: i64, direction: f64) -> (i64, f64, f64) {
    if direction > 0.0 {
        (1, 1.0 / direction, (cell as f64 + 1.0 - start) / direction)
    } else if direction < 0.0 {
        (-1, -1.0 / direction, (start - cell as f64) / -direction)
    } else {
        (0, f64::INFINITY, f64::INFINITY)
    }
}

/// Generates the scan a sensor would observe from a hypothesized pose in a known map.
#[derive(Debug, Clone)]
pub struct ScanSimulator {
    max_range: f64,
    params: SimulatorParams,
}

impl ScanSimulator {
    /// Create a simulator whose beams travel at most `max_range` meters.
    pub fn new(max_range: f64, params: SimulatorParams) -> Self {
        Self { max_range, params }
    }

    /// Maximum simulated distance in meters.
    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    /// Simulate a scan with the angular layout of `template`.
    ///
    /// # Arguments
    ///
    /// * `grid` - The map to cast rays through.
    /// * `sensor_pose` - Hypothesized pose of the sensor in the map frame.
    /// * `template` - Scan whose angles, `range_min` and stamp are reused.
    ///
    /// # Returns
    ///
    /// A scan with one sample per beam. Beams without a hit report `+inf`, hits
    /// closer than `range_min` report `-inf`. The returned `range_max` is the
    /// simulator's maximum range.
    pub fn simulate(
        &self,
        grid: &OccupancyGrid,
        sensor_pose: &RigidTransform,
        template: &LaserScan,
    ) -> Result<LaserScan, ScanError> {
        let num_beams = LaserScan::beam_count(
            template.angle_min,
            template.angle_max,
            template.angle_increment,
        )?;

        let origin = [sensor_pose.translation[0], sensor_pose.translation[1]];
        let yaw = sensor_pose.yaw();

        let ranges = (0..num_beams)
            .map(|i| {
                let angle = yaw + template.angle(i);
                match cast_ray(grid, origin, angle, self.max_range, &self.params) {
                    Some(range) if range < template.range_min => f64::NEG_INFINITY,
                    Some(range) => range,
                    None => f64::INFINITY,
                }
            })
            .collect::<Vec<_>>();

        let simulated = template.with_ranges(ranges, self.max_range);
        log::debug!(
            "Simulated scan: {} beams, {} hits",
            num_beams,
            simulated.valid_count()
        );

        Ok(simulated)
    }
}
