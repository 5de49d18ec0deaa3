//! Head pose estimation from sparse facial landmarks.
//!
//! Given 2D facial landmarks detected in a camera frame, this library
//! recovers the head's rotation and translation relative to a pinhole camera
//! by solving the Perspective-n-Point problem against a small canonical 3D
//! head model.
//!
//! The estimation pipeline consists of:
//! 1. Building the camera model from the frame resolution
//! 2. Pairing selected landmarks with model points (four- or six-point variants)
//! 3. Picking an initial guess from the apparent turn direction
//! 4. Iterative `PnP` refinement, optionally followed by Euler decomposition
//! 5. Optional filtering to smooth the results over time
//!
//! Landmark detection itself is external: anything implementing
//! [`landmarks::LandmarkProvider`] can feed the [`sampler`].
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```no_run
//! use head_pose_pnp::{
//!     correspondence::CorrespondenceVariant, landmarks::LandmarkSet, pose_estimation::PoseEstimator,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let estimator = PoseEstimator::new(640, 480)?;
//!
//! // 68 landmarks from some detector
//! let landmarks = LandmarkSet::from_pairs(&[(320.0, 240.0); 68]);
//! let estimate = estimator.estimate(&landmarks, CorrespondenceVariant::SixPoint)?;
//! if let Some(euler) = estimate.euler {
//!     println!("Pitch: {:.2}°, Yaw: {:.2}°, Roll: {:.2}°", euler.pitch, euler.yaw, euler.roll);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Using Filters
//!
//! ```
//! use head_pose_pnp::filters::create_filter;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut filter = create_filter("exponential:0.3")?;
//! let smoothed = filter.apply([10.5, -15.2, 2.0]);
//! println!("Smoothed: {smoothed:?}");
//! filter.reset();
//! # Ok(())
//! # }
//! ```
//!
//! ## Sampling a Recorded Stream
//!
//! ```no_run
//! use head_pose_pnp::{
//!     config::Config,
//!     replay::{RecordedLandmarkProvider, RecordedLandmarks},
//!     sampler::{self, Sample, SampleOutcome, SamplingLoop},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let recording = RecordedLandmarks::open("landmarks.txt", 640, 480)?;
//! let sampling_loop = SamplingLoop::from_config(&config, recording, RecordedLandmarkProvider)?;
//!
//! let handle = sampler::spawn(sampling_loop, |sample: &Sample| -> head_pose_pnp::Result<()> {
//!     if let SampleOutcome::Pose { angles, .. } = &sample.outcome {
//!         println!("{angles:?}");
//!     }
//!     Ok(())
//! })?;
//! let stats = handle.join()?;
//! println!("{} poses", stats.poses);
//! # Ok(())
//! # }
//! ```

/// Pinhole camera model derived from the frame resolution
pub mod camera;

/// Landmark sets and the frame/landmark source traits
pub mod landmarks;

/// Landmark-to-model correspondences
pub mod correspondence;

/// Initial guess selection for the solver
pub mod seeding;

/// Rotation conversions and Euler decomposition
pub mod rotation;

/// `PnP` solvers
pub mod solver;

/// Head pose estimation module using `PnP` algorithm
pub mod pose_estimation;

/// Signal filtering algorithms for smoothing pose estimates
pub mod filters;

/// Fixed-cadence sampling loop
pub mod sampler;

/// Recorded landmark streams
pub mod replay;

/// Landmark and pose drawing
pub mod overlay;

/// Live camera capture
#[cfg(feature = "opencv")]
pub mod capture;

/// Utility functions for coordinate handling
pub mod utils;

/// Error types and result handling
pub mod error;

/// Main application module
pub mod app;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
