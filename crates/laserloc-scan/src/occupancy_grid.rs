use laserloc_3d::transforms::RigidTransform;

use crate::ScanError;

/// Value of a cell whose occupancy is unknown.
pub const UNKNOWN_CELL: i8 = -1;

/// Value of a cell known to be free.
pub const FREE_CELL: i8 = 0;

/// Value of a cell known to be occupied.
pub const OCCUPIED_CELL: i8 = 100;

/// 2D occupancy grid map.
///
/// Cells are stored row-major starting at the cell closest to `origin`, with
/// values in `0..=100` (occupancy probability in percent) or [`UNKNOWN_CELL`].
/// Cell `(x, y)` covers `[x, x + 1) * resolution` by `[y, y + 1) * resolution`
/// in the grid frame; `origin` is the pose of the grid frame in the map frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    resolution: f64,
    origin: RigidTransform,
    data: Vec<i8>,
}

impl OccupancyGrid {
    /// Create a grid from its cell buffer.
    ///
    /// # Arguments
    ///
    /// * `width` - Number of cells along the grid x axis.
    /// * `height` - Number of cells along the grid y axis.
    /// * `resolution` - Cell size in meters.
    /// * `origin` - Pose of cell `(0, 0)`'s corner in the map frame.
    /// * `data` - Row-major cell values, `width * height` long.
    pub fn new(
        width: usize,
        height: usize,
        resolution: f64,
        origin: RigidTransform,
        data: Vec<i8>,
    ) -> Result<Self, ScanError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(ScanError::InvalidResolution(resolution));
        }
        let expected = cell_count(width, height, data.len())?;
        if data.len() != expected {
            return Err(ScanError::InvalidGrid {
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            resolution,
            origin,
            data,
        })
    }

    /// Create a grid with every cell set to `value`.
    pub fn filled(
        width: usize,
        height: usize,
        resolution: f64,
        origin: RigidTransform,
        value: i8,
    ) -> Result<Self, ScanError> {
        let count = cell_count(width, height, 0)?;
        Self::new(width, height, resolution, origin, vec![value; count])
    }

    /// Grid width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell size in meters.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Pose of the grid frame in the map frame.
    pub fn origin(&self) -> &RigidTransform {
        &self.origin
    }

    /// Raw cell values.
    pub fn data(&self) -> &[i8] {
        &self.data
    }

    /// Value of cell `(x, y)`, or `None` outside the grid.
    #[inline]
    pub fn cell(&self, x: i64, y: i64) -> Option<i8> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.data[y as usize * self.width + x as usize])
    }

    /// Set the value of cell `(x, y)`. Cells outside the grid are ignored.
    pub fn set_cell(&mut self, x: usize, y: usize, value: i8) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Mark every cell of a rectangular map-frame region with `value`.
    ///
    /// Only valid for grids whose origin is not rotated.
    pub fn fill_rect(&mut self, min: [f64; 2], max: [f64; 2], value: i8) {
        let lo = self.world_to_grid(&min);
        let hi = self.world_to_grid(&max);
        for y in lo.1.max(0)..=hi.1.min(self.height as i64 - 1) {
            for x in lo.0.max(0)..=hi.0.min(self.width as i64 - 1) {
                self.set_cell(x as usize, y as usize, value);
            }
        }
    }

    /// Convert a map-frame point into the continuous grid frame, in cells.
    pub fn world_to_grid_continuous(&self, world: &[f64; 2]) -> [f64; 2] {
        let local = self
            .origin
            .inverse()
            .transform_point(&[world[0], world[1], 0.0]);
        [local[0] / self.resolution, local[1] / self.resolution]
    }

    /// Convert a map-frame point into the index of the cell containing it.
    pub fn world_to_grid(&self, world: &[f64; 2]) -> (i64, i64) {
        let [gx, gy] = self.world_to_grid_continuous(world);
        (gx.floor() as i64, gy.floor() as i64)
    }

    /// Map-frame coordinates of the center of cell `(x, y)`.
    pub fn grid_to_world(&self, x: i64, y: i64) -> [f64; 2] {
        let local = [
            (x as f64 + 0.5) * self.resolution,
            (y as f64 + 0.5) * self.resolution,
            0.0,
        ];
        let world = self.origin.transform_point(&local);
        [world[0], world[1]]
    }
}

// number of cells, saturating `expected` in the error when it does not fit
fn cell_count(width: usize, height: usize, found: usize) -> Result<usize, ScanError> {
    width
        .checked_mul(height)
        .ok_or(ScanError::InvalidGrid {
            expected: usize::MAX,
            found,
        })
}
