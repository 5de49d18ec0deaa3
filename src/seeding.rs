//! Initial pose guesses for the iterative solver.
//!
//! The four-point correspondence set admits several exact solutions, so the
//! solver's starting point decides which one it lands on. The left/right
//! heuristic looks at where the nose sits between the outer eye corners and
//! starts from a fixed, empirically chosen pose for that side.
//!
//! The heuristic only distinguishes left from right, never up from down, and
//! can pick the wrong side when the face is far from frontal.

use crate::{
    constants::{
        LEFT_EYE_OUTER_CORNER, LEFT_TURN_ROTATION_SEED, NOSE_TIP, RIGHT_EYE_OUTER_CORNER, RIGHT_TURN_ROTATION_SEED,
        TRANSLATION_SEED,
    },
    correspondence::CorrespondenceVariant,
    landmarks::LandmarkSet,
    Error, Result,
};
use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the solver is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedingStrategy {
    /// Let the solver compute its own closed-form start
    None,
    /// Seed from a fixed left-turn or right-turn pose
    HeuristicLeftRight,
}

impl FromStr for SeedingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" | "closedform" => Ok(Self::None),
            "heuristic" | "heuristicleftright" | "leftright" => Ok(Self::HeuristicLeftRight),
            _ => Err(Error::InvalidInput(format!("Unknown seeding strategy: {s}"))),
        }
    }
}

/// Side the head appears to be turned towards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnSide {
    Left,
    Right,
}

/// Hand-tuned seed poses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConstants {
    /// Rotation vector used when the head looks turned left
    pub left_rotation: [f64; 3],
    /// Rotation vector used when the head looks turned right
    pub right_rotation: [f64; 3],
    /// Translation used for both sides
    pub translation: [f64; 3],
}

impl Default for SeedConstants {
    fn default() -> Self {
        Self {
            left_rotation: LEFT_TURN_ROTATION_SEED,
            right_rotation: RIGHT_TURN_ROTATION_SEED,
            translation: TRANSLATION_SEED,
        }
    }
}

/// Starting rotation vector and translation for the solver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialGuess {
    pub rotation_vector: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl InitialGuess {
    #[must_use]
    pub fn new(rotation_vector: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation_vector,
            translation,
        }
    }
}

/// Compare horizontal nose-to-eye-corner distances. Ties go right.
#[must_use]
pub fn choose_turn_side(nose: &Point2<f64>, left_eye: &Point2<f64>, right_eye: &Point2<f64>) -> TurnSide {
    let to_left = (left_eye.x - nose.x).abs();
    let to_right = (right_eye.x - nose.x).abs();
    if to_left < to_right {
        TurnSide::Left
    } else {
        TurnSide::Right
    }
}

impl SeedConstants {
    #[must_use]
    pub fn guess_for(&self, side: TurnSide) -> InitialGuess {
        let rotation = match side {
            TurnSide::Left => self.left_rotation,
            TurnSide::Right => self.right_rotation,
        };
        InitialGuess::new(Vector3::from(rotation), Vector3::from(self.translation))
    }
}

impl SeedingStrategy {
    /// Initial guess for these landmarks, or `None` for a closed-form start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLandmarks`] if the nose tip or eye corners are missing.
    pub fn initial_guess(
        self,
        landmarks: &LandmarkSet,
        variant: CorrespondenceVariant,
        seeds: &SeedConstants,
    ) -> Result<Option<InitialGuess>> {
        match self {
            Self::None => Ok(None),
            Self::HeuristicLeftRight => {
                let point = |idx: usize| {
                    landmarks.get(idx).ok_or_else(|| Error::InvalidLandmarks {
                        variant,
                        required: variant.required_landmarks(),
                        actual: landmarks.len(),
                    })
                };
                let side = choose_turn_side(
                    point(NOSE_TIP)?,
                    point(LEFT_EYE_OUTER_CORNER)?,
                    point(RIGHT_EYE_OUTER_CORNER)?,
                );
                log::trace!("Seeding solver with {side:?} turn");
                Ok(Some(seeds.guess_for(side)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_FACIAL_LANDMARKS;
    use proptest::prelude::*;

    fn face(nose_x: f64, left_x: f64, right_x: f64) -> LandmarkSet {
        let mut points = vec![Point2::new(0.0, 0.0); NUM_FACIAL_LANDMARKS];
        points[NOSE_TIP] = Point2::new(nose_x, 250.0);
        points[LEFT_EYE_OUTER_CORNER] = Point2::new(left_x, 200.0);
        points[RIGHT_EYE_OUTER_CORNER] = Point2::new(right_x, 200.0);
        LandmarkSet::new(points)
    }

    #[test]
    fn test_left_when_nose_closer_to_left_eye() {
        let side = choose_turn_side(
            &Point2::new(300.0, 250.0),
            &Point2::new(260.0, 200.0),
            &Point2::new(400.0, 200.0),
        );
        assert_eq!(side, TurnSide::Left);
    }

    #[test]
    fn test_right_when_nose_closer_to_right_eye() {
        let side = choose_turn_side(
            &Point2::new(370.0, 250.0),
            &Point2::new(260.0, 200.0),
            &Point2::new(400.0, 200.0),
        );
        assert_eq!(side, TurnSide::Right);
    }

    #[test]
    fn test_tie_goes_right() {
        let side = choose_turn_side(
            &Point2::new(320.0, 250.0),
            &Point2::new(270.0, 200.0),
            &Point2::new(370.0, 200.0),
        );
        assert_eq!(side, TurnSide::Right);
    }

    #[test]
    fn test_heuristic_uses_seed_constants() {
        let seeds = SeedConstants::default();
        let guess = SeedingStrategy::HeuristicLeftRight
            .initial_guess(&face(300.0, 260.0, 400.0), CorrespondenceVariant::FourPoint, &seeds)
            .unwrap()
            .unwrap();
        assert_eq!(guess.rotation_vector, Vector3::new(-1.0, -0.75, -3.0));
        assert_eq!(guess.translation, Vector3::new(-100.0, 100.0, 1000.0));

        let guess = SeedingStrategy::HeuristicLeftRight
            .initial_guess(&face(380.0, 260.0, 400.0), CorrespondenceVariant::FourPoint, &seeds)
            .unwrap()
            .unwrap();
        assert_eq!(guess.rotation_vector, Vector3::new(1.0, -0.75, -3.0));
    }

    #[test]
    fn test_none_strategy_has_no_guess() {
        let guess = SeedingStrategy::None
            .initial_guess(&face(300.0, 260.0, 400.0), CorrespondenceVariant::SixPoint, &SeedConstants::default())
            .unwrap();
        assert!(guess.is_none());
    }

    #[test]
    fn test_heuristic_on_short_set() {
        let short = LandmarkSet::new(vec![Point2::origin(); 40]);
        let result = SeedingStrategy::HeuristicLeftRight.initial_guess(
            &short,
            CorrespondenceVariant::FourPoint,
            &SeedConstants::default(),
        );
        assert!(matches!(result, Err(Error::InvalidLandmarks { actual: 40, .. })));
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("none".parse::<SeedingStrategy>().unwrap(), SeedingStrategy::None);
        assert_eq!(
            "heuristic_left_right".parse::<SeedingStrategy>().unwrap(),
            SeedingStrategy::HeuristicLeftRight
        );
        assert!("random".parse::<SeedingStrategy>().is_err());
    }

    proptest! {
        #[test]
        fn prop_side_matches_distance_comparison(
            nose in -1000.0f64..1000.0,
            left in -1000.0f64..1000.0,
            right in -1000.0f64..1000.0,
        ) {
            let side = choose_turn_side(&Point2::new(nose, 0.0), &Point2::new(left, 0.0), &Point2::new(right, 0.0));
            let expected = if (left - nose).abs() < (right - nose).abs() { TurnSide::Left } else { TurnSide::Right };
            prop_assert_eq!(side, expected);
        }

        #[test]
        fn prop_vertical_offsets_do_not_matter(
            nose_y in -500.0f64..500.0,
            eye_y in -500.0f64..500.0,
        ) {
            let side = choose_turn_side(
                &Point2::new(300.0, nose_y),
                &Point2::new(260.0, eye_y),
                &Point2::new(400.0, eye_y),
            );
            prop_assert_eq!(side, TurnSide::Left);
        }
    }
}
