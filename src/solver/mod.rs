//! Perspective-n-Point solvers.
//!
//! A solver recovers the rotation vector and translation that best project a
//! [`CorrespondenceSet`]'s model points onto its image points through a
//! [`CameraIntrinsics`]. The pure-Rust [`LevenbergMarquardt`] solver is always
//! available; the `opencv` feature adds [`OpenCvSolver`].

pub mod levenberg_marquardt;
#[cfg(feature = "opencv")]
pub mod opencv;

pub use levenberg_marquardt::LevenbergMarquardt;
#[cfg(feature = "opencv")]
pub use self::opencv::OpenCvSolver;

use crate::{
    camera::CameraIntrinsics,
    constants::{DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_REPROJECTION_ERROR},
    correspondence::CorrespondenceSet,
    seeding::InitialGuess,
    Error, Result,
};
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Solver tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Upper bound on refinement iterations per start
    pub max_iterations: usize,
    /// RMS reprojection error in pixels above which a result counts as diverged
    pub max_reprojection_error: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_reprojection_error: DEFAULT_MAX_REPROJECTION_ERROR,
        }
    }
}

impl SolverParams {
    /// Validate the parameters
    ///
    /// # Errors
    ///
    /// Returns an error if the iteration budget is zero or the error bound is not a positive number.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::ConfigError("Solver max_iterations must be at least 1".to_string()));
        }
        if !(self.max_reprojection_error.is_finite() && self.max_reprojection_error > 0.0) {
            return Err(Error::ConfigError(format!(
                "Solver max_reprojection_error must be positive, got {}",
                self.max_reprojection_error
            )));
        }
        Ok(())
    }
}

/// Raw solver result in the camera frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOutput {
    /// Axis-angle rotation, radians
    pub rotation_vector: Vector3<f64>,
    pub translation: Vector3<f64>,
    /// RMS reprojection error in pixels
    pub reprojection_error: f64,
    pub iterations: usize,
    /// Whether the refinement met its stopping criteria before running out of iterations
    pub converged: bool,
}

/// Pose solver interface
pub trait PnpSolver: Send + Sync {
    /// Solve for the pose of the model relative to the camera.
    ///
    /// With `initial_guess` the solver refines from that pose; without one it
    /// computes its own starting point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SolverFailure`] for degenerate correspondences and
    /// [`Error::SolverDivergence`] when the result does not explain the observations.
    fn solve(
        &self,
        correspondences: &CorrespondenceSet,
        camera: &CameraIntrinsics,
        initial_guess: Option<&InitialGuess>,
    ) -> Result<SolverOutput>;

    /// Get the solver name
    fn name(&self) -> &str;
}

/// Available solver implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverBackend {
    LevenbergMarquardt,
    #[serde(rename = "opencv")]
    OpenCv,
}

impl FromStr for SolverBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "lm" | "levenbergmarquardt" => Ok(Self::LevenbergMarquardt),
            "opencv" => Ok(Self::OpenCv),
            _ => Err(Error::InvalidInput(format!("Unknown solver backend: {s}"))),
        }
    }
}

/// Create a solver for the given backend
///
/// # Errors
///
/// Returns an error if the backend was not compiled in.
pub fn create_solver(backend: SolverBackend, params: SolverParams) -> Result<Box<dyn PnpSolver>> {
    match backend {
        SolverBackend::LevenbergMarquardt => Ok(Box::new(LevenbergMarquardt::new(params))),
        #[cfg(feature = "opencv")]
        SolverBackend::OpenCv => Ok(Box::new(OpenCvSolver::new(params))),
        #[cfg(not(feature = "opencv"))]
        SolverBackend::OpenCv => Err(Error::ConfigError(
            "The opencv solver needs the `opencv` cargo feature".to_string(),
        )),
    }
}

/// RMS pixel distance between observed image points and the projected model points.
///
/// Returns `None` if any model point lands on or behind the camera plane.
#[must_use]
pub fn reprojection_error(
    correspondences: &CorrespondenceSet,
    camera: &CameraIntrinsics,
    rotation_vector: &Vector3<f64>,
    translation: &Vector3<f64>,
) -> Option<f64> {
    if correspondences.is_empty() {
        return None;
    }
    let rotation = Rotation3::new(*rotation_vector);
    let mut sum = 0.0;
    for (model, observed) in correspondences.model_points().iter().zip(correspondences.image_points()) {
        let projected = camera.project(&(rotation.transform_point(model) + translation))?;
        sum += (projected - observed).norm_squared();
    }
    #[allow(clippy::cast_precision_loss)]
    let count = correspondences.len() as f64;
    Some((sum / count).sqrt())
}

/// Reject results that are not finite or reproject too poorly
fn check_solution(output: SolverOutput, params: &SolverParams) -> Result<SolverOutput> {
    let finite = output.rotation_vector.iter().chain(output.translation.iter()).all(|v| v.is_finite());
    if !finite || !output.reprojection_error.is_finite() || output.reprojection_error > params.max_reprojection_error {
        return Err(Error::SolverDivergence {
            iterations: output.iterations,
            reprojection_error: output.reprojection_error,
        });
    }
    Ok(output)
}
