//! Sampling loop behaviour on its worker thread


use crossbeam_channel::unbounded;
use head_pose_pnp::{
    config::Config,
    correspondence::CorrespondenceVariant,
    filters::create_filter,
    landmarks::{FrameSource, LandmarkSet},
    pose_estimation::PoseEstimator,
    replay::{RecordedLandmarkProvider, RecordedLandmarks},
    sampler::{self, stop_pair, Sample, SampleOutcome, SamplingLoop},
    Error, Result,
};
use nalgebra::Vector3;
use std::time::Duration;
use test_helpers::{facing_camera, recording_line, synthetic_landmarks, turned_face, vga_camera, write_recording};

/// Yields the same face forever
struct EndlessFace(LandmarkSet);

impl FrameSource for EndlessFace {
    type Frame = LandmarkSet;

    fn read(&mut self) -> Result<Option<LandmarkSet>> {
        Ok(Some(self.0.clone()))
    }

    fn resolution(&self) -> (u32, u32) {
        (640, 480)
    }
}

/// Replays one face with a per-frame resolution
struct ResizingFace {
    face: LandmarkSet,
    sizes: Vec<(u32, u32)>,
    current: (u32, u32),
}

impl FrameSource for ResizingFace {
    type Frame = LandmarkSet;

    fn read(&mut self) -> Result<Option<LandmarkSet>> {
        if self.sizes.is_empty() {
            return Ok(None);
        }
        self.current = self.sizes.remove(0);
        Ok(Some(self.face.clone()))
    }

    fn resolution(&self) -> (u32, u32) {
        self.current
    }
}

fn identity_provider(frame: &LandmarkSet) -> Result<Option<LandmarkSet>> {
    Ok(Some(frame.clone()))
}

fn collect_outcomes(path: &std::path::Path, config: &Config) -> (Vec<SampleOutcome>, sampler::LoopStats) {
    let recording = RecordedLandmarks::open(path, 640, 480).unwrap();
    let sampling_loop = SamplingLoop::from_config(config, recording, RecordedLandmarkProvider).unwrap();
    let (tx, rx) = unbounded();
    let handle = sampler::spawn(sampling_loop, move |sample: &Sample| -> Result<()> {
        let _ = tx.send(sample.outcome.clone());
        Ok(())
    })
    .unwrap();
    let stats = handle.join().unwrap();
    (rx.try_iter().collect(), stats)
}

fn fast_config() -> Config {
    let mut config = Config::default();
    config.capture.sample_interval_ms = 1;
    config.estimation.variant = CorrespondenceVariant::SixPoint;
    config.estimation.strict_landmarks = false;
    config
}

#[test]
fn test_stop_ends_endless_stream() {
    let estimator = PoseEstimator::new(640, 480).unwrap();
    let sampling_loop = SamplingLoop::new(
        EndlessFace(turned_face(&vga_camera())),
        identity_provider,
        estimator,
        CorrespondenceVariant::SixPoint,
    )
    .with_interval(Duration::from_millis(5));

    let (tx, rx) = unbounded();
    let handle = sampler::spawn(sampling_loop, move |sample: &Sample| -> Result<()> {
        let _ = tx.send(sample.index);
        Ok(())
    })
    .unwrap();

    // Wait until a few samples went through
    for expected in 0..3 {
        assert_eq!(rx.recv_timeout(Duration::from_secs(10)).unwrap(), expected);
    }
    assert!(!handle.is_finished());

    let stats = handle.stop().unwrap();
    assert!(stats.samples >= 3);
    assert_eq!(stats.poses, stats.samples);
    assert!(!stats.end_of_stream);
}

#[test]
fn test_recording_runs_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let face = recording_line(&turned_face(&vga_camera()));
    let path = write_recording(dir.path(), &[face.clone(), "-".to_string(), "1 2 3 4".to_string(), face]);

    let (outcomes, stats) = collect_outcomes(&path, &fast_config());
    assert!(stats.end_of_stream);
    assert_eq!((stats.samples, stats.poses, stats.no_face, stats.skipped), (4, 2, 1, 1));

    assert!(matches!(outcomes[0], SampleOutcome::Pose { .. }));
    assert!(matches!(outcomes[1], SampleOutcome::NoFace));
    assert!(matches!(&outcomes[2], SampleOutcome::Skipped { reason } if reason.contains("six-point")));
    if let SampleOutcome::Pose { estimate, angles, .. } = &outcomes[3] {
        assert_eq!(*angles, estimate.presentation_angles());
    } else {
        panic!("expected a pose");
    }
}

#[test]
fn test_strict_mode_aborts_on_short_landmarks() {
    let dir = tempfile::tempdir().unwrap();
    let face = recording_line(&turned_face(&vga_camera()));
    let path = write_recording(dir.path(), &[face.clone(), "1 2 3 4".to_string(), face]);

    let mut config = fast_config();
    config.estimation.strict_landmarks = true;
    let recording = RecordedLandmarks::open(&path, 640, 480).unwrap();
    let sampling_loop = SamplingLoop::from_config(&config, recording, RecordedLandmarkProvider).unwrap();
    let handle = sampler::spawn(sampling_loop, |_: &Sample| -> Result<()> { Ok(()) }).unwrap();

    let err = handle.join().unwrap_err();
    assert!(matches!(err, Error::InvalidLandmarks { actual: 2, .. }));
}

#[test]
fn test_filter_resets_when_face_is_lost() {
    let camera = vga_camera();
    let translation = Vector3::new(0.0, 0.0, 1000.0);
    let left = recording_line(&synthetic_landmarks(&camera, &facing_camera(-0.3, 0.0, 0.0), &translation));
    let right = recording_line(&synthetic_landmarks(&camera, &facing_camera(0.3, 0.0, 0.0), &translation));

    let dir = tempfile::tempdir().unwrap();
    let path = write_recording(dir.path(), &[left, right.clone(), "none".to_string(), right]);

    let mut config = fast_config();
    config.smoothing.filter = "exponential:0.5".to_string();
    let (outcomes, _) = collect_outcomes(&path, &config);

    let pose = |i: usize| match &outcomes[i] {
        SampleOutcome::Pose { estimate, angles, .. } => (estimate.presentation_angles(), *angles),
        other => panic!("sample {i}: expected a pose, got {other:?}"),
    };

    // Second sample is blended with the first
    let (raw, smoothed) = pose(1);
    assert!((raw[1] - smoothed[1]).abs() > 1.0);

    // After the face was lost the filter starts over
    let (raw, smoothed) = pose(3);
    assert_eq!(raw, smoothed);
}

#[test]
fn test_samples_respect_interval() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_recording(dir.path(), &["-".to_string(), "-".to_string(), "-".to_string()]);

    let recording = RecordedLandmarks::open(&path, 640, 480).unwrap();
    let sampling_loop = SamplingLoop::new(
        recording,
        RecordedLandmarkProvider,
        PoseEstimator::new(640, 480).unwrap(),
        CorrespondenceVariant::FourPoint,
    )
    .with_interval(Duration::from_millis(40))
    .with_filter(create_filter("median:3").unwrap());

    let mut elapsed = Vec::new();
    let (_stop, signal) = stop_pair();
    let stats = sampling_loop
        .run(&signal, &mut |sample: &Sample| -> Result<()> {
            elapsed.push(sample.elapsed);
            Ok(())
        })
        .unwrap();

    assert_eq!(stats.no_face, 3);
    assert!(elapsed[2] >= Duration::from_millis(80), "{elapsed:?}");
}

#[test]
fn test_sink_error_stops_loop() {
    let estimator = PoseEstimator::new(640, 480).unwrap();
    let sampling_loop = SamplingLoop::new(
        EndlessFace(turned_face(&vga_camera())),
        identity_provider,
        estimator,
        CorrespondenceVariant::SixPoint,
    )
    .with_interval(Duration::from_millis(1));

    let handle = sampler::spawn(sampling_loop, |sample: &Sample| -> Result<()> {
        if sample.index == 2 {
            Err(Error::InvalidInput("sink full".to_string()))
        } else {
            Ok(())
        }
    })
    .unwrap();
    assert!(matches!(handle.join(), Err(Error::InvalidInput(_))));
}

#[test]
fn test_empty_resolution_skips_frame() {
    let source = ResizingFace {
        face: turned_face(&vga_camera()),
        sizes: vec![(640, 480), (0, 0), (640, 480)],
        current: (640, 480),
    };
    let sampling_loop = SamplingLoop::new(
        source,
        identity_provider,
        PoseEstimator::new(640, 480).unwrap(),
        CorrespondenceVariant::SixPoint,
    )
    .with_interval(Duration::ZERO);

    let mut outcomes = Vec::new();
    let (_stop, signal) = stop_pair();
    let stats = sampling_loop
        .run(&signal, &mut |sample: &Sample| -> Result<()> {
            outcomes.push(sample.outcome.clone());
            Ok(())
        })
        .unwrap();

    assert!(stats.end_of_stream);
    assert_eq!((stats.samples, stats.poses, stats.skipped), (3, 2, 1));
    assert!(matches!(&outcomes[1], SampleOutcome::Skipped { reason } if reason.contains("0x0")));
    assert!(matches!(outcomes[2], SampleOutcome::Pose { .. }));
}
