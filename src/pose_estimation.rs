use crate::{
    camera::CameraIntrinsics,
    config::EstimationConfig,
    correspondence::{CorrespondenceSet, CorrespondenceVariant},
    landmarks::LandmarkSet,
    rotation::{euler_from_pose, rotation_matrix, rotation_vector_degrees, EulerAngles},
    seeding::{SeedConstants, SeedingStrategy},
    solver::{create_solver, LevenbergMarquardt, PnpSolver, SolverParams},
    Error, Result,
};
use nalgebra::{Matrix3, Vector3};

/// Head pose for one frame, in the camera frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    /// Correspondence variant that produced this estimate
    pub variant: CorrespondenceVariant,
    /// Axis-angle rotation in radians, as the solver returned it
    pub rotation_vector: Vector3<f64>,
    pub translation: Vector3<f64>,
    /// Euler decomposition, computed for the six-point variant
    pub euler: Option<EulerAngles>,
    /// RMS reprojection error in pixels
    pub reprojection_error: f64,
    pub iterations: usize,
}

impl PoseEstimate {
    /// Rotation vector components in degrees
    #[must_use]
    pub fn rotation_degrees(&self) -> Vector3<f64> {
        rotation_vector_degrees(&self.rotation_vector)
    }

    #[must_use]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        rotation_matrix(&self.rotation_vector)
    }

    /// The three angles shown to the user: Euler `[pitch, yaw, roll]` when
    /// available, otherwise the rotation vector in degrees
    #[must_use]
    pub fn presentation_angles(&self) -> [f64; 3] {
        match self.euler {
            Some(euler) => euler.to_array(),
            None => {
                let degrees = self.rotation_degrees();
                [degrees.x, degrees.y, degrees.z]
            }
        }
    }
}

/// Head pose estimator using `PnP` algorithm
pub struct PoseEstimator {
    camera: CameraIntrinsics,
    solver: Box<dyn PnpSolver>,
    seeding: SeedingStrategy,
    seeds: SeedConstants,
    retry_alternate_variant: bool,
}

impl PoseEstimator {
    /// Estimator for `width` x `height` frames with the default solver and
    /// left/right seeding
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let camera = CameraIntrinsics::from_resolution(width, height)?;
        log::info!("Initializing PoseEstimator for {width}x{height} frames");
        Ok(Self {
            camera,
            solver: Box::new(LevenbergMarquardt::new(SolverParams::default())),
            seeding: SeedingStrategy::HeuristicLeftRight,
            seeds: SeedConstants::default(),
            retry_alternate_variant: false,
        })
    }

    /// Build from the estimation section of the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the resolution is empty or the solver backend is unavailable.
    pub fn from_config(config: &EstimationConfig, width: u32, height: u32) -> Result<Self> {
        let solver = create_solver(config.backend, config.solver)?;
        log::info!(
            "Using {} solver, {} correspondences, {:?} seeding",
            solver.name(),
            config.variant,
            config.seeding
        );
        Ok(Self::new(width, height)?
            .with_solver(solver)
            .with_seeding(config.seeding, config.seeds)
            .with_retry_alternate_variant(config.retry_alternate_variant))
    }

    #[must_use]
    pub fn with_solver(mut self, solver: Box<dyn PnpSolver>) -> Self {
        self.solver = solver;
        self
    }

    #[must_use]
    pub fn with_seeding(mut self, seeding: SeedingStrategy, seeds: SeedConstants) -> Self {
        self.seeding = seeding;
        self.seeds = seeds;
        self
    }

    #[must_use]
    pub fn with_retry_alternate_variant(mut self, retry: bool) -> Self {
        self.retry_alternate_variant = retry;
        self
    }

    #[must_use]
    pub fn camera(&self) -> &CameraIntrinsics {
        &self.camera
    }

    #[must_use]
    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }

    /// Rebuild the camera model if the frame resolution changed.
    ///
    /// Returns whether the intrinsics were rebuilt.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero.
    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<bool> {
        if self.camera.resolution() == (width, height) {
            return Ok(false);
        }
        self.camera = CameraIntrinsics::from_resolution(width, height)?;
        log::info!("Camera intrinsics rebuilt for {width}x{height}");
        Ok(true)
    }

    /// Estimate head pose from a landmark set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLandmarks`] if the set is too short for
    /// `variant`, and [`Error::SolverFailure`] or [`Error::SolverDivergence`]
    /// when no pose could be recovered (after the optional retry with the
    /// other variant).
    pub fn estimate(&self, landmarks: &LandmarkSet, variant: CorrespondenceVariant) -> Result<PoseEstimate> {
        match self.estimate_with(landmarks, variant) {
            Err(err @ (Error::SolverFailure(_) | Error::SolverDivergence { .. })) if self.retry_alternate_variant => {
                let alternate = variant.alternate();
                log::warn!("{variant} solve failed ({err}), retrying with {alternate}");
                self.estimate_with(landmarks, alternate).map_err(|retry_err| {
                    log::debug!("{alternate} retry failed too: {retry_err}");
                    err
                })
            }
            other => other,
        }
    }

    fn estimate_with(&self, landmarks: &LandmarkSet, variant: CorrespondenceVariant) -> Result<PoseEstimate> {
        let correspondences = CorrespondenceSet::build(landmarks, variant)?;
        let guess = self.seeding.initial_guess(landmarks, variant, &self.seeds)?;
        let output = self.solver.solve(&correspondences, &self.camera, guess.as_ref())?;

        let euler = match variant {
            CorrespondenceVariant::SixPoint => Some(euler_from_pose(&output.rotation_vector, &output.translation)),
            CorrespondenceVariant::FourPoint => None,
        };

        log::debug!(
            "{variant} pose: rvec [{:.3}, {:.3}, {:.3}], t [{:.1}, {:.1}, {:.1}], rms {:.2}px in {} iterations",
            output.rotation_vector.x,
            output.rotation_vector.y,
            output.rotation_vector.z,
            output.translation.x,
            output.translation.y,
            output.translation.z,
            output.reprojection_error,
            output.iterations
        );

        Ok(PoseEstimate {
            variant,
            rotation_vector: output.rotation_vector,
            translation: output.translation,
            euler,
            reprojection_error: output.reprojection_error,
            iterations: output.iterations,
        })
    }
}
