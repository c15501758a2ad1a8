use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::ops::normalize_angle;

/// Convert a column-major glam matrix into a row-major array.
pub(crate) fn mat3_to_array(mat: &DMat3) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        *row = mat.row(i).to_array();
    }
    out
}

/// Convert a row-major array into a column-major glam matrix.
pub(crate) fn array_to_mat3(array: &[[f64; 3]; 3]) -> DMat3 {
    DMat3::from_cols_array_2d(array).transpose()
}

/// A rigid body transform: rotation followed by translation.
///
/// Poses are transforms from a child frame to a parent frame, e.g. `map_T_base`
/// maps points in the robot base frame into the map frame. Laser localization
/// only ever produces planar motion, but the transform is kept in SE(3) so it
/// can carry sensor mounting offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    /// Row-major rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        translation: [0.0, 0.0, 0.0],
    };

    /// Create a transform from a rotation matrix and a translation vector.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Create a planar transform from `x`, `y` and a yaw angle around the z axis.
    pub fn from_planar(x: f64, y: f64, yaw: f64) -> Self {
        let (s, c) = yaw.sin_cos();
        Self {
            rotation: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
            translation: [x, y, 0.0],
        }
    }

    /// Create a pure translation.
    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self {
            rotation: Self::IDENTITY.rotation,
            translation,
        }
    }

    /// Heading around the z axis in `(-pi, pi]`.
    pub fn yaw(&self) -> f64 {
        normalize_angle(self.rotation[1][0].atan2(self.rotation[0][0]))
    }

    /// Total rotation angle in `[0, pi]`, independent of the rotation axis.
    pub fn rotation_angle(&self) -> f64 {
        let trace = self.rotation[0][0] + self.rotation[1][1] + self.rotation[2][2];
        ((trace - 1.0) * 0.5).clamp(-1.0, 1.0).acos()
    }

    /// Length of the translation vector.
    pub fn translation_norm(&self) -> f64 {
        DVec3::from_array(self.translation).length()
    }

    /// Compose two transforms as `self * other`.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        let r_a = array_to_mat3(&self.rotation);
        let r_b = array_to_mat3(&other.rotation);
        let t = r_a * DVec3::from_array(other.translation) + DVec3::from_array(self.translation);
        RigidTransform {
            rotation: mat3_to_array(&(r_a * r_b)),
            translation: t.to_array(),
        }
    }

    /// The inverse transform.
    pub fn inverse(&self) -> RigidTransform {
        let r_inv = array_to_mat3(&self.rotation).transpose();
        let t_inv = -(r_inv * DVec3::from_array(self.translation));
        RigidTransform {
            rotation: mat3_to_array(&r_inv),
            translation: t_inv.to_array(),
        }
    }

    /// Apply the transform to a single point.
    pub fn transform_point(&self, point: &[f64; 3]) -> [f64; 3] {
        let r = array_to_mat3(&self.rotation);
        (r * DVec3::from_array(*point) + DVec3::from_array(self.translation)).to_array()
    }
}

impl std::ops::Mul<RigidTransform> for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, other: RigidTransform) -> RigidTransform {
        self.compose(&other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_planar_rotation() {
        let yaw = 0.7;
        let planar = RigidTransform::from_planar(0.0, 0.0, yaw);
        let (s, c) = yaw.sin_cos();
        let expected = [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(planar.rotation[i][j], expected[i][j], epsilon = 1e-12);
            }
        }
        assert_relative_eq!(planar.yaw(), yaw, epsilon = 1e-12);
        assert_relative_eq!(planar.rotation_angle(), yaw, epsilon = 1e-9);
    }

    #[test]
    fn test_compose_and_inverse() {
        let a = RigidTransform::from_planar(1.0, 2.0, 0.5);
        let b = RigidTransform::from_planar(-0.5, 0.25, -1.2);

        let ab = a * b;
        let p = [0.3, -0.7, 0.0];
        let expected = a.transform_point(&b.transform_point(&p));
        let got = ab.transform_point(&p);
        for i in 0..3 {
            assert_relative_eq!(got[i], expected[i], epsilon = 1e-12);
        }

        let identity = a * a.inverse();
        assert_relative_eq!(identity.translation_norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(identity.rotation_angle(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_compose_planar_yaw_wraps() {
        let a = RigidTransform::from_planar(0.0, 0.0, 3.0);
        let b = RigidTransform::from_planar(0.0, 0.0, 0.5);
        let yaw = (a * b).yaw();
        assert_relative_eq!(yaw, 3.5 - 2.0 * std::f64::consts::PI, epsilon = 1e-12);
    }

    #[test]
    fn test_translation_is_rotated() {
        let pose = RigidTransform::from_planar(1.0, 0.0, std::f64::consts::FRAC_PI_2);
        let step = RigidTransform::from_translation([1.0, 0.0, 0.0]);
        let moved = pose * step;
        assert_relative_eq!(moved.translation[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(moved.translation[1], 1.0, epsilon = 1e-12);
    }
}
