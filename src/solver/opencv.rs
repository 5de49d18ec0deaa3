//! `calib3d::solve_pnp` backend.

use super::{check_solution, reprojection_error, PnpSolver, SolverOutput, SolverParams};
use crate::{
    camera::CameraIntrinsics, correspondence::CorrespondenceSet, seeding::InitialGuess, utils::safe_cast::usize_to_i32,
    Error, Result,
};
use nalgebra::Vector3;
use opencv::{
    calib3d,
    core::{Mat, CV_64F},
    prelude::*,
};

/// Iterative `PnP` through `OpenCV`
#[derive(Debug, Clone)]
pub struct OpenCvSolver {
    params: SolverParams,
}

impl OpenCvSolver {
    #[must_use]
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }
}

/// Fill a `rows` x `cols` `CV_64F` matrix from row-major values
fn mat_from_row_major(values: &[f64], rows: usize, cols: usize) -> Result<Mat> {
    let mut mat = Mat::zeros(usize_to_i32(rows)?, usize_to_i32(cols)?, CV_64F)?.to_mat()?;
    for (idx, &value) in values.iter().enumerate() {
        *mat.at_2d_mut::<f64>(usize_to_i32(idx / cols)?, usize_to_i32(idx % cols)?)? = value;
    }
    Ok(mat)
}

fn read_vec3(mat: &Mat) -> Result<Vector3<f64>> {
    Ok(Vector3::new(
        *mat.at_2d::<f64>(0, 0)?,
        *mat.at_2d::<f64>(1, 0)?,
        *mat.at_2d::<f64>(2, 0)?,
    ))
}

impl PnpSolver for OpenCvSolver {
    fn solve(
        &self,
        correspondences: &CorrespondenceSet,
        camera: &CameraIntrinsics,
        initial_guess: Option<&InitialGuess>,
    ) -> Result<SolverOutput> {
        let count = correspondences.len();
        let object_points = mat_from_row_major(&correspondences.model_points_row_major(), count, 3)?;
        let image_points = mat_from_row_major(&correspondences.image_points_row_major(), count, 2)?;
        let camera_matrix = mat_from_row_major(camera.matrix().transpose().as_slice(), 3, 3)?;
        let dist_coeffs = mat_from_row_major(&camera.distortion(), camera.distortion().len(), 1)?;

        let (mut rvec, mut tvec) = match initial_guess {
            Some(guess) => (
                mat_from_row_major(guess.rotation_vector.as_slice(), 3, 1)?,
                mat_from_row_major(guess.translation.as_slice(), 3, 1)?,
            ),
            None => (Mat::default(), Mat::default()),
        };

        let solved = calib3d::solve_pnp(
            &object_points,
            &image_points,
            &camera_matrix,
            &dist_coeffs,
            &mut rvec,
            &mut tvec,
            initial_guess.is_some(),
            calib3d::SOLVEPNP_ITERATIVE,
        )
        .map_err(|e| Error::SolverFailure(format!("solvePnP: {e}")))?;
        if !solved {
            return Err(Error::SolverFailure("solvePnP reported no solution".to_string()));
        }

        let rotation_vector = read_vec3(&rvec)?;
        let translation = read_vec3(&tvec)?;
        let reprojection_error =
            reprojection_error(correspondences, camera, &rotation_vector, &translation).unwrap_or(f64::INFINITY);

        check_solution(
            SolverOutput {
                rotation_vector,
                translation,
                reprojection_error,
                // calib3d does not report its iteration count
                iterations: 0,
                converged: true,
            },
            &self.params,
        )
    }

    fn name(&self) -> &str {
        "opencv"
    }
}
