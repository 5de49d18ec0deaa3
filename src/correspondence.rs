//! 2D-3D correspondences between detected landmarks and a canonical head model.

use crate::{
    constants::{
        CHIN, LEFT_EYE_OUTER_CORNER, LEFT_MOUTH_CORNER, NOSE_TIP, RIGHT_EYE_OUTER_CORNER, RIGHT_MOUTH_CORNER,
    },
    landmarks::LandmarkSet,
    Error, Result,
};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which subset of landmarks is fed to the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrespondenceVariant {
    /// Nose tip (twice), outer eye corners
    FourPoint,
    /// Nose tip, chin, outer eye corners, mouth corners
    SixPoint,
}

// The nose tip is listed twice: the iterative solver misbehaves with fewer
// than four correspondences.
const FOUR_POINT_INDICES: [usize; 4] = [NOSE_TIP, NOSE_TIP, LEFT_EYE_OUTER_CORNER, RIGHT_EYE_OUTER_CORNER];

const SIX_POINT_INDICES: [usize; 6] = [
    NOSE_TIP,
    CHIN,
    LEFT_EYE_OUTER_CORNER,
    RIGHT_EYE_OUTER_CORNER,
    LEFT_MOUTH_CORNER,
    RIGHT_MOUTH_CORNER,
];

/// Approximate adult head geometry, nose tip at the origin. Not metric-calibrated.
const NOSE_MODEL: Point3<f64> = Point3::new(0.0, 0.0, 0.0);
const CHIN_MODEL: Point3<f64> = Point3::new(0.0, -330.0, -65.0);
const LEFT_EYE_MODEL: Point3<f64> = Point3::new(-225.0, 170.0, -135.0);
const RIGHT_EYE_MODEL: Point3<f64> = Point3::new(225.0, 170.0, -135.0);
const LEFT_MOUTH_MODEL: Point3<f64> = Point3::new(-150.0, -150.0, -125.0);
const RIGHT_MOUTH_MODEL: Point3<f64> = Point3::new(150.0, -150.0, -125.0);

static FOUR_POINT_MODEL: [Point3<f64>; 4] = [NOSE_MODEL, NOSE_MODEL, LEFT_EYE_MODEL, RIGHT_EYE_MODEL];

static SIX_POINT_MODEL: [Point3<f64>; 6] = [
    NOSE_MODEL,
    CHIN_MODEL,
    LEFT_EYE_MODEL,
    RIGHT_EYE_MODEL,
    LEFT_MOUTH_MODEL,
    RIGHT_MOUTH_MODEL,
];

impl CorrespondenceVariant {
    /// Landmark indices used, in solver order
    #[must_use]
    pub fn landmark_indices(self) -> &'static [usize] {
        match self {
            Self::FourPoint => &FOUR_POINT_INDICES,
            Self::SixPoint => &SIX_POINT_INDICES,
        }
    }

    /// Canonical 3D model points, in the same order as [`Self::landmark_indices`]
    #[must_use]
    pub fn model_points(self) -> &'static [Point3<f64>] {
        match self {
            Self::FourPoint => &FOUR_POINT_MODEL,
            Self::SixPoint => &SIX_POINT_MODEL,
        }
    }

    /// Minimum landmark count this variant can index into
    #[must_use]
    pub fn required_landmarks(self) -> usize {
        self.landmark_indices().iter().max().map_or(0, |&max| max + 1)
    }

    /// The other variant, used when retrying a failed solve
    #[must_use]
    pub fn alternate(self) -> Self {
        match self {
            Self::FourPoint => Self::SixPoint,
            Self::SixPoint => Self::FourPoint,
        }
    }
}

impl fmt::Display for CorrespondenceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FourPoint => write!(f, "four-point"),
            Self::SixPoint => write!(f, "six-point"),
        }
    }
}

impl FromStr for CorrespondenceVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "4" | "fourpoint" | "four" => Ok(Self::FourPoint),
            "6" | "sixpoint" | "six" => Ok(Self::SixPoint),
            _ => Err(Error::InvalidInput(format!("Unknown correspondence variant: {s}"))),
        }
    }
}

/// Image points paired with their model points
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceSet {
    variant: CorrespondenceVariant,
    image_points: Vec<Point2<f64>>,
}

impl CorrespondenceSet {
    /// Pick the variant's landmarks out of a full landmark set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLandmarks`] if the set is too short for the
    /// indices this variant references.
    pub fn build(landmarks: &LandmarkSet, variant: CorrespondenceVariant) -> Result<Self> {
        let required = variant.required_landmarks();
        if landmarks.len() < required {
            return Err(Error::InvalidLandmarks {
                variant,
                required,
                actual: landmarks.len(),
            });
        }

        let image_points = variant
            .landmark_indices()
            .iter()
            .map(|&idx| landmarks.points()[idx])
            .collect();

        Ok(Self { variant, image_points })
    }

    #[must_use]
    pub fn variant(&self) -> CorrespondenceVariant {
        self.variant
    }

    #[must_use]
    pub fn image_points(&self) -> &[Point2<f64>] {
        &self.image_points
    }

    #[must_use]
    pub fn model_points(&self) -> &'static [Point3<f64>] {
        self.variant.model_points()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }

    /// Image points flattened as `[x0, y0, x1, y1, ...]`
    #[must_use]
    pub fn image_points_row_major(&self) -> Vec<f64> {
        self.image_points.iter().flat_map(|p| [p.x, p.y]).collect()
    }

    /// Model points flattened as `[x0, y0, z0, x1, ...]`
    #[must_use]
    pub fn model_points_row_major(&self) -> Vec<f64> {
        self.model_points().iter().flat_map(|p| [p.x, p.y, p.z]).collect()
    }
}
