//! Property tests for landmark selection and solver seeding

use head_pose_pnp::{
    constants::{LEFT_EYE_OUTER_CORNER, NOSE_TIP, RIGHT_EYE_OUTER_CORNER},
    correspondence::{CorrespondenceSet, CorrespondenceVariant},
    landmarks::LandmarkSet,
    seeding::{choose_turn_side, SeedConstants, SeedingStrategy, TurnSide},
    Error,
};
use nalgebra::{Point2, Vector3};
use proptest::prelude::*;

fn variant() -> impl Strategy<Value = CorrespondenceVariant> {
    prop_oneof![Just(CorrespondenceVariant::FourPoint), Just(CorrespondenceVariant::SixPoint)]
}

fn landmark_set(len: usize) -> impl Strategy<Value = LandmarkSet> {
    prop::collection::vec((0.0f64..640.0, 0.0f64..480.0), len)
        .prop_map(|pairs| LandmarkSet::new(pairs.into_iter().map(|(x, y)| Point2::new(x, y)).collect()))
}

#[test]
fn test_required_landmarks() {
    assert_eq!(CorrespondenceVariant::FourPoint.required_landmarks(), 46);
    assert_eq!(CorrespondenceVariant::SixPoint.required_landmarks(), 55);
    assert_eq!(CorrespondenceVariant::FourPoint.alternate(), CorrespondenceVariant::SixPoint);
    assert_eq!(CorrespondenceVariant::SixPoint.alternate(), CorrespondenceVariant::FourPoint);
}

#[test]
fn test_seeds_pick_side() {
    let seeds = SeedConstants::default();
    let mut points = vec![Point2::new(320.0, 240.0); 68];
    points[NOSE_TIP] = Point2::new(300.0, 250.0);
    points[LEFT_EYE_OUTER_CORNER] = Point2::new(280.0, 200.0);
    points[RIGHT_EYE_OUTER_CORNER] = Point2::new(400.0, 200.0);
    let landmarks = LandmarkSet::new(points);

    let guess = SeedingStrategy::HeuristicLeftRight
        .initial_guess(&landmarks, CorrespondenceVariant::SixPoint, &seeds)
        .unwrap()
        .unwrap();
    assert_eq!(guess.rotation_vector, Vector3::from(seeds.left_rotation));
    assert_eq!(guess.translation, Vector3::new(-100.0, 100.0, 1000.0));

    assert!(SeedingStrategy::None
        .initial_guess(&landmarks, CorrespondenceVariant::SixPoint, &seeds)
        .unwrap()
        .is_none());
}

proptest! {
    #[test]
    fn prop_build_picks_variant_landmarks(variant in variant(), landmarks in landmark_set(68)) {
        let set = CorrespondenceSet::build(&landmarks, variant).unwrap();
        prop_assert_eq!(set.len(), variant.landmark_indices().len());
        prop_assert_eq!(set.model_points().len(), set.len());
        for (point, &idx) in set.image_points().iter().zip(variant.landmark_indices()) {
            prop_assert_eq!(Some(point), landmarks.get(idx));
        }

        let flat = set.image_points_row_major();
        prop_assert_eq!(flat.len(), 2 * set.len());
        prop_assert_eq!(flat[0], set.image_points()[0].x);
        prop_assert_eq!(flat[1], set.image_points()[0].y);
    }

    #[test]
    fn prop_short_sets_rejected(variant in variant(), len in 0usize..46) {
        let landmarks = LandmarkSet::new(vec![Point2::new(1.0, 1.0); len]);
        let err = CorrespondenceSet::build(&landmarks, variant).unwrap_err();
        let is_invalid_landmarks = matches!(
            err,
            Error::InvalidLandmarks { required, actual, .. }
                if required == variant.required_landmarks() && actual == len
        );
        prop_assert!(is_invalid_landmarks);
    }

    #[test]
    fn prop_turn_side_mirrors(
        nose_x in 200.0f64..440.0,
        left_offset in 1.0f64..150.0,
        right_offset in 1.0f64..150.0,
    ) {
        prop_assume!((left_offset - right_offset).abs() > 1e-6);
        let nose = Point2::new(nose_x, 250.0);
        let left = Point2::new(nose_x - left_offset, 200.0);
        let right = Point2::new(nose_x + right_offset, 200.0);

        let side = choose_turn_side(&nose, &left, &right);
        let expected = if left_offset < right_offset { TurnSide::Left } else { TurnSide::Right };
        prop_assert_eq!(side, expected);

        // Swapping the eyes flips the decision
        let swapped = choose_turn_side(&nose, &Point2::new(nose_x - right_offset, 200.0), &Point2::new(nose_x + left_offset, 200.0));
        prop_assert_ne!(side, swapped);
    }
}
