//! Iterative `PnP` by Levenberg-Marquardt minimisation of reprojection error.
//!
//! The state is `[rx, ry, rz, tx, ty, tz]`: an axis-angle rotation and a
//! translation. Residuals are the pixel differences between observed image
//! points and projected model points, and the Jacobian is taken by central
//! differences. Without an initial guess the solver starts from a
//! weak-perspective fit, trying both depth-relief interpretations of the fit
//! and keeping whichever refines to the lower error.

use super::{check_solution, PnpSolver, SolverOutput, SolverParams};
use crate::{camera::CameraIntrinsics, correspondence::CorrespondenceSet, seeding::InitialGuess, Error, Result};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Point3, Rotation3, UnitQuaternion, Vector2, Vector3, Vector6};

const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e12;
const DAMPING_FACTOR: f64 = 10.0;
const JACOBIAN_STEP: f64 = 1e-6;
const RELATIVE_COST_TOLERANCE: f64 = 1e-12;
const STEP_TOLERANCE: f64 = 1e-10;
const COST_FLOOR: f64 = 1e-18;
/// Relative singular value cutoff for rank decisions and the pseudo-inverse
const RANK_TOLERANCE: f64 = 1e-9;
/// Points closer than this (in model units or pixels) count as the same point
const DISTINCT_POINT_TOLERANCE: f64 = 1e-9;

/// Pure-Rust iterative solver
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    params: SolverParams,
}

/// One refinement run from one starting state
#[derive(Debug, Clone, Copy)]
struct Refinement {
    state: Vector6<f64>,
    cost: f64,
    iterations: usize,
    converged: bool,
}

impl LevenbergMarquardt {
    #[must_use]
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Minimise from `start`. `None` when the start puts a model point behind the camera.
    ///
    /// Stops unconverged if the Jacobian cannot be taken at the current state.
    fn refine(&self, problem: &Problem<'_>, start: Vector6<f64>) -> Option<Refinement> {
        let mut state = start;
        let mut residual = problem.residuals(&state)?;
        let mut cost = residual.norm_squared();
        let mut damping = INITIAL_DAMPING;
        let mut iterations = 0;
        let mut converged = cost < COST_FLOOR;

        while !converged && iterations < self.params.max_iterations {
            // A difference step crossed the camera plane: keep what we have
            let Some(jacobian) = problem.jacobian(&state) else {
                log::trace!("Jacobian undefined at iteration {iterations}, stopping refinement");
                break;
            };
            iterations += 1;
            let jtj = jacobian.transpose() * &jacobian;
            let gradient = jacobian.transpose() * &residual;

            let mut improved = false;
            while damping <= MAX_DAMPING {
                let mut damped = jtj.clone();
                for k in 0..6 {
                    damped[(k, k)] += damping * jtj[(k, k)].max(MIN_DAMPING);
                }
                let Some(delta) = damped.lu().solve(&(-&gradient)) else {
                    damping *= DAMPING_FACTOR;
                    continue;
                };
                let delta = Vector6::from_column_slice(delta.as_slice());
                let candidate = state + delta;

                match problem.residuals(&candidate) {
                    Some(candidate_residual) if candidate_residual.norm_squared() < cost => {
                        let candidate_cost = candidate_residual.norm_squared();
                        let small_gain = cost - candidate_cost <= RELATIVE_COST_TOLERANCE * cost;
                        let small_step = delta.norm() <= STEP_TOLERANCE * (state.norm() + STEP_TOLERANCE);

                        state = candidate;
                        residual = candidate_residual;
                        cost = candidate_cost;
                        damping = (damping / DAMPING_FACTOR).max(MIN_DAMPING);
                        converged = small_gain || small_step || cost < COST_FLOOR;
                        improved = true;
                        break;
                    }
                    _ => damping *= DAMPING_FACTOR,
                }
            }

            // No damping level lowers the cost: a local minimum
            if !improved {
                converged = true;
            }
        }

        Some(Refinement {
            state,
            cost,
            iterations,
            converged,
        })
    }
}

impl PnpSolver for LevenbergMarquardt {
    fn solve(
        &self,
        correspondences: &CorrespondenceSet,
        camera: &CameraIntrinsics,
        initial_guess: Option<&InitialGuess>,
    ) -> Result<SolverOutput> {
        let problem = Problem::new(correspondences, camera)?;

        let starts = match initial_guess {
            Some(guess) => vec![pack_state(&guess.rotation_vector, &guess.translation)],
            None => problem.weak_perspective_starts()?,
        };

        let best = starts
            .into_iter()
            .filter_map(|start| self.refine(&problem, start))
            .min_by(|a, b| a.cost.total_cmp(&b.cost))
            .ok_or_else(|| Error::SolverFailure("No starting pose keeps the model in front of the camera".to_string()))?;

        #[allow(clippy::cast_precision_loss)]
        let reprojection_error = (best.cost / problem.model.len() as f64).sqrt();
        log::trace!(
            "LM finished after {} iterations, rms {:.4}px, converged: {}",
            best.iterations,
            reprojection_error,
            best.converged
        );

        check_solution(
            SolverOutput {
                rotation_vector: best.state.fixed_rows::<3>(0).into_owned(),
                translation: best.state.fixed_rows::<3>(3).into_owned(),
                reprojection_error,
                iterations: best.iterations,
                converged: best.converged,
            },
            &self.params,
        )
    }

    fn name(&self) -> &str {
        "levenberg_marquardt"
    }
}

fn pack_state(rotation_vector: &Vector3<f64>, translation: &Vector3<f64>) -> Vector6<f64> {
    Vector6::new(
        rotation_vector.x,
        rotation_vector.y,
        rotation_vector.z,
        translation.x,
        translation.y,
        translation.z,
    )
}

/// Correspondences and camera for one solve
struct Problem<'a> {
    model: &'a [Point3<f64>],
    image: &'a [Point2<f64>],
    camera: &'a CameraIntrinsics,
}

impl<'a> Problem<'a> {
    /// Reject sets no solver can recover a pose from
    fn new(correspondences: &'a CorrespondenceSet, camera: &'a CameraIntrinsics) -> Result<Self> {
        let model = correspondences.model_points();
        let image = correspondences.image_points();

        if model.len() != image.len() {
            return Err(Error::SolverFailure(format!(
                "{} model points for {} image points",
                model.len(),
                image.len()
            )));
        }
        if image.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(Error::SolverFailure("Image points contain non-finite values".to_string()));
        }

        let distinct = distinct_count(model.iter().map(|p| p.coords.as_slice()));
        if distinct < 3 {
            return Err(Error::SolverFailure(format!(
                "Need at least 3 distinct model points, got {distinct}"
            )));
        }

        if !spans_plane(centered_model(model)) {
            return Err(Error::SolverFailure("Model points are collinear".to_string()));
        }

        if distinct_count(image.iter().map(|p| p.coords.as_slice())) < 2 {
            return Err(Error::SolverFailure("Image points collapse to a single point".to_string()));
        }
        // A line of image points admits a family of exact poses, whatever the start
        if !spans_plane(centered_image(image)) {
            return Err(Error::SolverFailure("Image points are collinear".to_string()));
        }

        Ok(Self { model, image, camera })
    }

    /// Stacked `[du0, dv0, du1, dv1, ...]`, or `None` if a point falls behind the camera
    fn residuals(&self, state: &Vector6<f64>) -> Option<DVector<f64>> {
        let rotation = Rotation3::new(state.fixed_rows::<3>(0).into_owned());
        let translation: Vector3<f64> = state.fixed_rows::<3>(3).into_owned();

        let mut out = DVector::zeros(self.model.len() * 2);
        for (i, (model, observed)) in self.model.iter().zip(self.image).enumerate() {
            let projected = self.camera.project(&(rotation.transform_point(model) + translation))?;
            out[2 * i] = projected.x - observed.x;
            out[2 * i + 1] = projected.y - observed.y;
        }
        Some(out)
    }

    fn jacobian(&self, state: &Vector6<f64>) -> Option<DMatrix<f64>> {
        let mut jacobian = DMatrix::zeros(self.model.len() * 2, 6);
        for j in 0..6 {
            let step = JACOBIAN_STEP * state[j].abs().max(1.0);
            let mut forward = *state;
            forward[j] += step;
            let mut backward = *state;
            backward[j] -= step;

            let column = (self.residuals(&forward)? - self.residuals(&backward)?) / (2.0 * step);
            jacobian.set_column(j, &column);
        }
        Some(jacobian)
    }

    /// Scaled-orthographic fit of the model onto the image.
    ///
    /// The affine fit `A = M B⁺` of centred image points `A` against centred
    /// model points `B` gives the first two rotation rows up to a common
    /// scale `s`, and the depth follows as `f / s`. The sign of the rows'
    /// z components is ambiguous under weak perspective, so both are returned.
    fn weak_perspective_starts(&self) -> Result<Vec<Vector6<f64>>> {
        #[allow(clippy::cast_precision_loss)]
        let count = self.image.len() as f64;
        let image_centroid = self.image.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / count;
        let model_centroid = self.model.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / count;

        let centered_image = centered_image(self.image);
        let centered_model = centered_model(self.model);

        let svd = centered_model.svd(true, true);
        let cutoff = RANK_TOLERANCE * svd.singular_values.max();
        let model_pinv = svd
            .pseudo_inverse(cutoff)
            .map_err(|e| Error::SolverFailure(format!("Pseudo-inverse failed: {e}")))?;
        let affine = centered_image * model_pinv;

        let m1 = Vector3::new(affine[(0, 0)], affine[(0, 1)], affine[(0, 2)]);
        let m2 = Vector3::new(affine[(1, 0)], affine[(1, 1)], affine[(1, 2)]);
        let scale = (m1.norm() + m2.norm()) / 2.0;
        if !scale.is_finite() || scale <= DISTINCT_POINT_TOLERANCE {
            return Err(Error::SolverFailure("Image points collapse to a single point".to_string()));
        }

        let focal_length = self.camera.focal_length();
        let (cx, cy) = self.camera.center();
        let depth = focal_length / scale;

        let mut starts = Vec::with_capacity(2);
        for relief in [1.0, -1.0] {
            let row1 = Vector3::new(m1.x, m1.y, relief * m1.z);
            let row2 = Vector3::new(m2.x, m2.y, relief * m2.z);
            let Some(rotation) = rotation_from_rows(&row1, &row2) else {
                continue;
            };

            let rotated_centroid = rotation * model_centroid;
            let translation = Vector3::new(
                (image_centroid.x - cx) * depth / focal_length - rotated_centroid.x,
                (image_centroid.y - cy) * depth / focal_length - rotated_centroid.y,
                depth - rotated_centroid.z,
            );
            // Quaternion log map stays well-defined at half a turn
            let rotation_vector = UnitQuaternion::from_rotation_matrix(&rotation).scaled_axis();
            starts.push(pack_state(&rotation_vector, &translation));
        }

        if starts.is_empty() {
            return Err(Error::SolverFailure(
                "Image points are collinear, no rotation fits".to_string(),
            ));
        }
        Ok(starts)
    }
}

/// 3 x n matrix of model points minus their centroid
fn centered_model(model: &[Point3<f64>]) -> DMatrix<f64> {
    #[allow(clippy::cast_precision_loss)]
    let count = model.len() as f64;
    let centroid = model.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / count;
    DMatrix::from_fn(3, model.len(), |r, c| model[c].coords[r] - centroid[r])
}

/// 2 x n matrix of image points minus their centroid
fn centered_image(image: &[Point2<f64>]) -> DMatrix<f64> {
    #[allow(clippy::cast_precision_loss)]
    let count = image.len() as f64;
    let centroid = image.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / count;
    DMatrix::from_fn(2, image.len(), |r, c| image[c].coords[r] - centroid[r])
}

/// Whether centred points spread over at least two directions
fn spans_plane(centered: DMatrix<f64>) -> bool {
    let mut spread: Vec<f64> = centered.svd(false, false).singular_values.iter().copied().collect();
    spread.sort_by(|a, b| b.total_cmp(a));
    match spread.as_slice() {
        [largest, second, ..] => *second > RANK_TOLERANCE * *largest,
        _ => false,
    }
}

/// Orthonormalise two approximate rotation rows (Gram-Schmidt) and complete the frame
fn rotation_from_rows(row1: &Vector3<f64>, row2: &Vector3<f64>) -> Option<Rotation3<f64>> {
    let x = row1.try_normalize(DISTINCT_POINT_TOLERANCE)?;
    let y = (row2 - x * x.dot(row2)).try_normalize(DISTINCT_POINT_TOLERANCE)?;
    let z = x.cross(&y);
    Some(Rotation3::from_matrix_unchecked(Matrix3::from_rows(&[
        x.transpose(),
        y.transpose(),
        z.transpose(),
    ])))
}

fn distinct_count<'p>(points: impl Iterator<Item = &'p [f64]>) -> usize {
    let mut seen: Vec<&[f64]> = Vec::new();
    for point in points {
        let duplicate = seen.iter().any(|other| {
            other
                .iter()
                .zip(point)
                .all(|(a, b)| (a - b).abs() <= DISTINCT_POINT_TOLERANCE)
        });
        if !duplicate {
            seen.push(point);
        }
    }
    seen.len()
}
