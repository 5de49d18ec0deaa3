//! Error types for the head pose estimation library.

use crate::correspondence::CorrespondenceVariant;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding or decoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Landmark set too short for the requested correspondence variant
    #[error("Invalid landmarks for {variant} correspondences: need at least {required} points, got {actual}")]
    InvalidLandmarks {
        /// Variant that was requested
        variant: CorrespondenceVariant,
        /// Minimum number of landmarks the variant indexes into
        required: usize,
        /// Number of landmarks supplied
        actual: usize,
    },

    /// The pose solver could not produce a result (degenerate input, numerical breakdown)
    #[error("Solver failure: {0}")]
    SolverFailure(String),

    /// The pose solver produced a result that does not explain the observations
    #[error("Solver diverged after {iterations} iterations (reprojection error {reprojection_error:.2}px)")]
    SolverDivergence {
        /// Iterations spent before giving up
        iterations: usize,
        /// Root-mean-square reprojection error of the final estimate, in pixels
        reprojection_error: f64,
    },

    /// The camera or landmark stream could not be opened
    #[error("Camera acquisition failed: {0}")]
    CameraAcquisition(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Filter initialization or processing error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The background sampling thread panicked
    #[error("Sampling thread panicked")]
    SamplerPanicked,
}

impl Error {
    /// Whether the error only invalidates the current frame.
    ///
    /// The sampling loop skips such frames and keeps running.
    #[must_use]
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            Self::SolverFailure(_) | Self::SolverDivergence { .. } | Self::InvalidLandmarks { .. }
        )
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
