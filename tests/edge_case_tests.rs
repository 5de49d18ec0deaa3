//! Edge case tests for filters, recordings, and rendering


use head_pose_pnp::{
    correspondence::CorrespondenceVariant,
    filters::create_filter,
    landmarks::{FrameSource, LandmarkSet},
    overlay::{blank_canvas, draw_landmarks, draw_line, draw_pose_box, LANDMARK_COLOR, POSE_BOX_COLOR},
    pose_estimation::PoseEstimate,
    replay::RecordedLandmarks,
    rotation::euler_from_pose,
};
use nalgebra::{Point2, Vector3};
use test_helpers::vga_camera;

const ALL_FILTERS: [&str; 5] = ["none", "moving_average:5", "median:5", "exponential:0.8", "kalman"];

#[test]
fn test_filter_extreme_values() {
    for spec in ALL_FILTERS {
        let mut filter = create_filter(spec).unwrap();
        let extreme_values = [
            [f64::INFINITY, f64::NEG_INFINITY, 0.0],
            [f64::NAN, f64::NAN, f64::NAN],
            [f64::MAX, f64::MIN, 1e100],
            [0.0, 0.0, 0.0],
        ];
        // Must not panic
        for angles in extreme_values {
            let _ = filter.apply(angles);
        }
    }
}

#[test]
fn test_filter_reset_behavior() {
    for spec in ["moving_average:3", "median:3", "exponential:0.5", "kalman"] {
        let mut filter = create_filter(spec).unwrap();
        filter.apply([10.0, 20.0, 1.0]);
        filter.apply([15.0, 25.0, 2.0]);
        filter.apply([20.0, 30.0, 3.0]);
        let before_reset = filter.apply([80.0, 90.0, 4.0]);

        filter.reset();
        let after_reset = filter.apply([80.0, 90.0, 4.0]);

        // A fresh filter passes its first sample through
        assert_eq!(after_reset, [80.0, 90.0, 4.0], "{}", filter.name());
        assert_ne!(before_reset, after_reset, "{} ignored its history", filter.name());
    }
}

#[test]
fn test_filter_convergence() {
    for spec in ALL_FILTERS {
        let mut filter = create_filter(spec).unwrap();
        let target = [42.0, -84.0, 7.0];
        let mut last = [0.0; 3];
        filter.apply([0.0, 0.0, 0.0]);
        for _ in 0..100 {
            last = filter.apply(target);
        }
        for axis in 0..3 {
            assert!(
                (last[axis] - target[axis]).abs() < 1.0,
                "Filter {} did not converge on axis {axis}: {last:?}",
                filter.name()
            );
        }
    }
}

#[test]
fn test_recording_with_only_comments() {
    let mut recording = RecordedLandmarks::parse("# nothing here\n\n   \n", 640, 480).unwrap();
    assert!(recording.is_empty());
    assert!(recording.read().unwrap().is_none());
}

#[test]
fn test_recording_single_point_frame() {
    let mut recording = RecordedLandmarks::parse("1e3 -2.5\n", 1280, 720).unwrap();
    let frame = recording.read().unwrap().unwrap();
    assert_eq!(frame.landmarks.unwrap().points(), &[Point2::new(1000.0, -2.5)]);
    assert_eq!(recording.resolution(), (1280, 720));
}

#[test]
fn test_drawing_far_outside_image() {
    let mut image = blank_canvas(32, 24);
    draw_line(&mut image, &Point2::new(-1e12, -1e12), &Point2::new(1e12, 1e12), POSE_BOX_COLOR);
    draw_line(&mut image, &Point2::new(f64::NAN, 0.0), &Point2::new(5.0, 5.0), POSE_BOX_COLOR);
    draw_landmarks(
        &mut image,
        &LandmarkSet::new(vec![Point2::new(f64::INFINITY, 3.0), Point2::new(-1e9, 1e9)]),
        LANDMARK_COLOR,
    );
    assert_eq!(image.dimensions(), (32, 24));
}

#[test]
fn test_pose_box_straddling_camera_plane() {
    let estimate = PoseEstimate {
        variant: CorrespondenceVariant::SixPoint,
        rotation_vector: Vector3::new(std::f64::consts::PI, 0.0, 0.0),
        translation: Vector3::new(0.0, 0.0, 50.0),
        euler: None,
        reprojection_error: 0.0,
        iterations: 0,
    };
    let mut image = blank_canvas(640, 480);
    // Front face of the box ends up behind the camera
    assert!(!draw_pose_box(&mut image, &estimate, &vga_camera(), POSE_BOX_COLOR));
}

#[test]
fn test_euler_angles_stay_folded() {
    for rx in [-3.0, -1.5, 0.0, 1.5, 3.0] {
        for ry in [-3.0, 0.0, 3.0] {
            let euler = euler_from_pose(&Vector3::new(rx, ry, 0.5), &Vector3::new(0.0, 0.0, 1000.0));
            for angle in euler.to_array() {
                assert!((-90.0..=90.0).contains(&angle), "{angle}");
            }
        }
    }
}
