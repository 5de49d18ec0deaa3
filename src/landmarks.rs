//! Facial landmark sets and the boundary traits for whatever produces them.
//!
//! Landmark detection itself happens outside this crate. A [`LandmarkProvider`]
//! turns a frame from a [`FrameSource`] into an optional [`LandmarkSet`];
//! `Ok(None)` means no face was found in that frame.

use crate::{constants::NUM_FACIAL_LANDMARKS, Result};
use nalgebra::Point2;

/// Ordered landmark coordinates in pixel space for one detected face.
///
/// Indices follow the 68-point iBUG convention. The set is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point2<f64>>,
}

impl LandmarkSet {
    #[must_use]
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    /// Build from `(x, y)` pairs as emitted by most landmark models
    #[must_use]
    pub fn from_pairs(pairs: &[(f32, f32)]) -> Self {
        Self {
            points: pairs
                .iter()
                .map(|&(x, y)| Point2::new(f64::from(x), f64::from(y)))
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether all 68 landmarks are present
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.points.len() >= NUM_FACIAL_LANDMARKS
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Point2<f64>> {
        self.points.get(index)
    }

    #[must_use]
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }
}

/// Something that yields frames at a known resolution (camera, video, recording).
pub trait FrameSource {
    type Frame;

    /// Read the next frame, `Ok(None)` at end of stream
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying stream breaks.
    fn read(&mut self) -> Result<Option<Self::Frame>>;

    /// Actual resolution of the frames, as reported by the stream
    fn resolution(&self) -> (u32, u32);
}

/// External landmark detector.
pub trait LandmarkProvider<F> {
    /// Detect a single face in `frame`.
    ///
    /// # Errors
    ///
    /// Returns an error if detection itself fails. Finding no face is not an error.
    fn detect(&mut self, frame: &F) -> Result<Option<LandmarkSet>>;
}

impl<F, T> LandmarkProvider<F> for T
where
    T: FnMut(&F) -> Result<Option<LandmarkSet>>,
{
    fn detect(&mut self, frame: &F) -> Result<Option<LandmarkSet>> {
        self(frame)
    }
}
