//! Rotation representations and the projection-matrix Euler decomposition.

use nalgebra::{Matrix3, Matrix3x4, Rotation3, Vector3};
use std::f64::consts::PI;

/// Convert radians to degrees as `radians / π * 180`
#[must_use]
pub fn radians_to_degrees(radians: f64) -> f64 {
    radians / PI * 180.0
}

/// Convert each component of a rotation vector to degrees, keeping sign and axis order
#[must_use]
pub fn rotation_vector_degrees(rotation_vector: &Vector3<f64>) -> Vector3<f64> {
    rotation_vector.map(radians_to_degrees)
}

/// Rodrigues: axis-angle vector to rotation matrix
#[must_use]
pub fn rotation_matrix(rotation_vector: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::new(*rotation_vector).into_inner()
}

/// `[R | t]`
#[must_use]
pub fn projection_matrix(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Matrix3x4<f64> {
    let mut projection = Matrix3x4::zeros();
    projection.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    projection.set_column(3, translation);
    projection
}

/// Head orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    /// Rotation about the camera x axis
    pub pitch: f64,
    /// Rotation about the camera y axis
    pub yaw: f64,
    /// Rotation about the camera z axis
    pub roll: f64,
}

impl EulerAngles {
    #[must_use]
    pub fn to_array(&self) -> [f64; 3] {
        [self.pitch, self.yaw, self.roll]
    }
}

/// Result of splitting a projection matrix `P = K [R | t]`
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionDecomposition {
    /// Upper-triangular factor
    pub intrinsic: Matrix3<f64>,
    /// Orthonormal factor
    pub rotation: Matrix3<f64>,
    /// Camera position in model coordinates
    pub camera_center: Vector3<f64>,
    /// Raw Givens angles, degrees
    pub raw_angles: Vector3<f64>,
    /// Angles folded through `asin(sin(θ))` into `[-90°, 90°]`
    pub euler: EulerAngles,
}

/// Givens rotation about `axis` built from an unnormalized `(sin, cos)` pair, with its angle
#[rustfmt::skip]
fn givens(axis: usize, s: f64, c: f64) -> (Matrix3<f64>, f64) {
    let norm = (c * c + s * s + f64::EPSILON).sqrt();
    let (s, c) = (s / norm, c / norm);
    let q = match axis {
        0 => Matrix3::new(
            1.0, 0.0, 0.0,
            0.0, c, s,
            0.0, -s, c,
        ),
        1 => Matrix3::new(
            c, 0.0, -s,
            0.0, 1.0, 0.0,
            s, 0.0, c,
        ),
        _ => Matrix3::new(
            c, s, 0.0,
            -s, c, 0.0,
            0.0, 0.0, 1.0,
        ),
    };
    (q, s.atan2(c))
}

/// Fold an angle into `[-π/2, π/2]`; a half-turn ambiguity collapses onto the same value
#[must_use]
pub fn fold_angle(radians: f64) -> f64 {
    radians.sin().asin()
}

/// RQ-decompose the left 3x3 block of `projection` with three Givens rotations
/// and extract per-axis angles.
#[must_use]
pub fn decompose_projection_matrix(projection: &Matrix3x4<f64>) -> ProjectionDecomposition {
    let m: Matrix3<f64> = projection.fixed_view::<3, 3>(0, 0).into_owned();

    let (qx, theta_x) = givens(0, m[(2, 1)], m[(2, 2)]);
    let r = m * qx;
    let (qy, theta_y) = givens(1, -r[(2, 0)], r[(2, 2)]);
    let r = r * qy;
    let (qz, theta_z) = givens(2, r[(1, 0)], r[(1, 1)]);
    let intrinsic = r * qz;

    // m = intrinsic * (qx * qy * qz)^T
    let rotation = (qx * qy * qz).transpose();

    let camera_center = m
        .try_inverse()
        .map_or_else(Vector3::zeros, |inverse| -(inverse * projection.column(3)));

    let raw = Vector3::new(theta_x, theta_y, theta_z);
    ProjectionDecomposition {
        intrinsic,
        rotation,
        camera_center,
        raw_angles: raw.map(radians_to_degrees),
        euler: EulerAngles {
            pitch: radians_to_degrees(fold_angle(theta_x)),
            yaw: radians_to_degrees(fold_angle(theta_y)),
            roll: radians_to_degrees(fold_angle(theta_z)),
        },
    }
}

/// Rotation vector and translation to folded Euler angles
#[must_use]
pub fn euler_from_pose(rotation_vector: &Vector3<f64>, translation: &Vector3<f64>) -> EulerAngles {
    let projection = projection_matrix(&rotation_matrix(rotation_vector), translation);
    decompose_projection_matrix(&projection).euler
}
