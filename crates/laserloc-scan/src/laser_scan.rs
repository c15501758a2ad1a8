use serde::{Deserialize, Serialize};

use crate::ScanError;

/// Upper bound on the number of beams in a single sweep.
pub const MAX_BEAMS: usize = 1 << 20;

/// A planar range scan.
///
/// Beam `i` points at `angle_min + i * angle_increment` in the sensor frame.
/// Samples that are not finite mark missing returns: `+inf` for no return
/// within range, `-inf` for a return closer than `range_min`, `NaN` for an
/// erroneous measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    /// Acquisition time in seconds.
    pub stamp: f64,
    /// Angle of the first beam in radians.
    pub angle_min: f64,
    /// Angle of the last beam in radians.
    pub angle_max: f64,
    /// Angular distance between beams in radians.
    pub angle_increment: f64,
    /// Minimum valid range in meters.
    pub range_min: f64,
    /// Maximum valid range in meters.
    pub range_max: f64,
    /// Range samples in meters.
    pub ranges: Vec<f64>,
}

impl LaserScan {
    /// Number of beams in a sweep from `angle_min` to `angle_max`.
    ///
    /// Sweeps with more than [`MAX_BEAMS`] beams are rejected.
    pub fn beam_count(
        angle_min: f64,
        angle_max: f64,
        angle_increment: f64,
    ) -> Result<usize, ScanError> {
        let invalid = || ScanError::InvalidAngularRange {
            angle_min,
            angle_max,
            angle_increment,
        };
        if !(angle_min.is_finite() && angle_max.is_finite() && angle_increment.is_finite()) {
            return Err(invalid());
        }
        if angle_increment <= 0.0 || angle_max < angle_min {
            return Err(invalid());
        }
        let steps = ((angle_max - angle_min) / angle_increment).round();
        if !steps.is_finite() || steps >= MAX_BEAMS as f64 {
            return Err(invalid());
        }
        (steps as usize).checked_add(1).ok_or_else(invalid)
    }

    /// Angle of beam `index` in the sensor frame.
    #[inline]
    pub fn angle(&self, index: usize) -> f64 {
        self.angle_min + index as f64 * self.angle_increment
    }

    /// Whether `range` is a usable return for this scan.
    #[inline]
    pub fn is_valid_range(&self, range: f64) -> bool {
        range.is_finite() && range >= self.range_min && range <= self.range_max
    }

    /// Number of usable returns.
    pub fn valid_count(&self) -> usize {
        self.ranges
            .iter()
            .filter(|r| self.is_valid_range(**r))
            .count()
    }

    /// Iterate over `(angle, range)` for every sample, valid or not.
    pub fn beams(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.ranges
            .iter()
            .enumerate()
            .map(|(i, r)| (self.angle(i), *r))
    }

    /// Create a scan sharing this scan's angular layout with new samples.
    pub fn with_ranges(&self, ranges: Vec<f64>, range_max: f64) -> LaserScan {
        LaserScan {
            stamp: self.stamp,
            angle_min: self.angle_min,
            angle_max: self.angle_max,
            angle_increment: self.angle_increment,
            range_min: self.range_min,
            range_max,
            ranges,
        }
    }
}
