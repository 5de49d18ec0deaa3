//! Pinhole camera model used by the pose solver.

use crate::{
    constants::{CAMERA_CENTER_FACTOR, DISTORTION_COEFFS_LEN},
    Error, Result,
};
use nalgebra::{Matrix3, Point2, Point3};

/// Intrinsic parameters of an uncalibrated pinhole camera.
///
/// The focal length is taken equal to the image width on both axes and the
/// principal point sits at the image center. This is a simplification, not a
/// calibrated value. Square pixels, no skew, no lens distortion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    width: u32,
    height: u32,
    focal_length: f64,
    center: (f64, f64),
}

impl CameraIntrinsics {
    /// Build the camera model for an image of `width` x `height` pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero.
    pub fn from_resolution(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "Image dimensions must be positive, got {width}x{height}"
            )));
        }

        let focal_length = f64::from(width);
        let center = (
            f64::from(width) / CAMERA_CENTER_FACTOR,
            f64::from(height) / CAMERA_CENTER_FACTOR,
        );

        Ok(Self {
            width,
            height,
            focal_length,
            center,
        })
    }

    /// Image resolution this model was built for
    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn focal_length(&self) -> f64 {
        self.focal_length
    }

    /// Principal point in pixels
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    /// The 3x3 camera matrix `K`
    #[must_use]
    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        let f = self.focal_length;
        let (cx, cy) = self.center;
        Matrix3::new(
            f, 0.0, cx,
            0.0, f, cy,
            0.0, 0.0, 1.0,
        )
    }

    /// Distortion coefficients `(k1, k2, p1, p2)`, always zero
    #[must_use]
    pub fn distortion(&self) -> [f64; DISTORTION_COEFFS_LEN] {
        [0.0; DISTORTION_COEFFS_LEN]
    }

    /// Project a point given in camera coordinates onto the image plane.
    ///
    /// Returns `None` for points on or behind the camera plane.
    #[must_use]
    pub fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
        if point.z <= f64::EPSILON {
            return None;
        }
        Some(Point2::new(
            self.focal_length * point.x / point.z + self.center.0,
            self.focal_length * point.y / point.z + self.center.1,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolution_matrix() {
        let camera = CameraIntrinsics::from_resolution(640, 480).unwrap();
        let k = camera.matrix();

        assert_eq!(k[(0, 0)], 640.0);
        assert_eq!(k[(1, 1)], 640.0);
        assert_eq!(k[(0, 2)], 320.0);
        assert_eq!(k[(1, 2)], 240.0);
        assert_eq!(k[(2, 2)], 1.0);
        assert_eq!(k[(0, 1)], 0.0);
        assert_eq!(k[(1, 0)], 0.0);
        assert_eq!(k[(2, 0)], 0.0);
        assert_eq!(k[(2, 1)], 0.0);
    }

    #[test]
    fn test_zero_distortion() {
        let camera = CameraIntrinsics::from_resolution(1280, 720).unwrap();
        assert_eq!(camera.distortion(), [0.0; 4]);
    }

    #[test]
    fn test_rejects_empty_image() {
        assert!(CameraIntrinsics::from_resolution(0, 480).is_err());
        assert!(CameraIntrinsics::from_resolution(640, 0).is_err());
    }

    #[test]
    fn test_project_principal_axis() {
        let camera = CameraIntrinsics::from_resolution(640, 480).unwrap();
        let p = camera.project(&Point3::new(0.0, 0.0, 1000.0)).unwrap();
        assert_eq!(p, Point2::new(320.0, 240.0));

        let p = camera.project(&Point3::new(100.0, -50.0, 1000.0)).unwrap();
        assert!((p.x - 384.0).abs() < 1e-9);
        assert!((p.y - 208.0).abs() < 1e-9);
    }

    #[test]
    fn test_project_behind_camera() {
        let camera = CameraIntrinsics::from_resolution(640, 480).unwrap();
        assert!(camera.project(&Point3::new(0.0, 0.0, -10.0)).is_none());
        assert!(camera.project(&Point3::new(1.0, 1.0, 0.0)).is_none());
    }
}
