use crate::{linalg::transform_points, transforms::RigidTransform};

/// An unordered set of 3D points.
///
/// Point clouds are derived values: they are rebuilt for every scan and never
/// mutated in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
}

impl PointCloud {
    /// Create a new point cloud from points.
    pub fn new(points: Vec<[f64; 3]>) -> Self {
        Self { points }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Return a copy of the point cloud with every point mapped through `transform`.
    pub fn transformed(&self, transform: &RigidTransform) -> PointCloud {
        let mut points = vec![[0.0; 3]; self.points.len()];
        transform_points(
            &self.points,
            &transform.rotation,
            &transform.translation,
            &mut points,
        );
        PointCloud { points }
    }

    /// Get the minimum and maximum corners of the axis aligned bounding box.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (
                [lo[0].min(p[0]), lo[1].min(p[1]), lo[2].min(p[2])],
                [hi[0].max(p[0]), hi[1].max(p[1]), hi[2].max(p[2])],
            )
        }))
    }
}

impl From<Vec<[f64; 3]>> for PointCloud {
    fn from(points: Vec<[f64; 3]>) -> Self {
        Self::new(points)
    }
}
