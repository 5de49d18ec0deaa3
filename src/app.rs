//! Main application module for head pose estimation.

use crate::{
    config::Config,
    overlay::{self, LANDMARK_COLOR, POSE_BOX_COLOR},
    replay::{RecordedLandmarkProvider, RecordedLandmarks},
    sampler::{self, LoopStats, Sample, SampleOutcome, SampleSink, SamplingLoop},
    Result,
};
use log::{debug, info};
use std::path::PathBuf;

/// Bounding box color around the detected landmarks
const FACE_BOUNDS_COLOR: image::Rgb<u8> = image::Rgb([0, 160, 255]);

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Where the landmark stream comes from
    pub input: InputSource,
    /// Estimation, smoothing and overlay settings
    pub settings: Config,
}

/// Landmark stream the application drives
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    /// Recorded landmark file, replayed at the configured resolution
    Recorded(PathBuf),
}

/// Logs every sample and optionally renders overlay snapshots
pub struct ReportSink {
    overlay_dir: Option<PathBuf>,
    snapshots: usize,
}

impl ReportSink {
    #[must_use]
    pub fn new(overlay_dir: Option<PathBuf>) -> Self {
        Self {
            overlay_dir,
            snapshots: 0,
        }
    }

    /// Number of overlay images written so far
    #[must_use]
    pub fn snapshots(&self) -> usize {
        self.snapshots
    }
}

impl SampleSink for ReportSink {
    fn on_sample(&mut self, sample: &Sample) -> Result<()> {
        match &sample.outcome {
            SampleOutcome::Pose {
                estimate,
                angles,
                landmarks,
            } => {
                let t = estimate.translation;
                info!(
                    "[{:>5}] {:>7.2}s {} angles [{:.1}, {:.1}, {:.1}] deg, translation [{:.0}, {:.0}, {:.0}], rms {:.2}px",
                    sample.index,
                    sample.elapsed.as_secs_f64(),
                    estimate.variant,
                    angles[0],
                    angles[1],
                    angles[2],
                    t.x,
                    t.y,
                    t.z,
                    estimate.reprojection_error
                );

                if let Some(dir) = &self.overlay_dir {
                    let (width, height) = sample.camera.resolution();
                    let mut canvas = overlay::blank_canvas(width, height);
                    overlay::draw_face_bounds(&mut canvas, landmarks, FACE_BOUNDS_COLOR);
                    overlay::draw_landmarks(&mut canvas, landmarks, LANDMARK_COLOR);
                    if !overlay::draw_pose_box(&mut canvas, estimate, &sample.camera, POSE_BOX_COLOR) {
                        debug!("Pose box is behind the camera, not drawn");
                    }
                    overlay::save_snapshot(&canvas, dir, sample.index)?;
                    self.snapshots += 1;
                }
            }
            SampleOutcome::NoFace => debug!("[{:>5}] no face", sample.index),
            SampleOutcome::Skipped { reason } => debug!("[{:>5}] skipped: {reason}", sample.index),
        }
        Ok(())
    }
}

/// Main application struct
pub struct HeadPoseApp {
    settings: Config,
    recording: RecordedLandmarks,
}

impl HeadPoseApp {
    /// Validate the settings and open the input stream
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the input cannot be opened.
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing Head Pose Estimation application");
        config.settings.validate()?;

        let recording = match &config.input {
            InputSource::Recorded(path) => {
                info!("Opening landmark recording: {}", path.display());
                RecordedLandmarks::open(path, config.settings.capture.width, config.settings.capture.height)?
            }
        };

        Ok(Self {
            settings: config.settings,
            recording,
        })
    }

    /// Run the sampling loop on its worker thread until the input is exhausted
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of the loop or its sink.
    pub fn run(self) -> Result<LoopStats> {
        let overlay_dir = self
            .settings
            .overlay
            .enabled
            .then(|| self.settings.overlay.output_dir.clone());
        if let Some(dir) = &overlay_dir {
            info!("Writing overlay snapshots to {}", dir.display());
        }

        let sampling_loop = SamplingLoop::from_config(&self.settings, self.recording, RecordedLandmarkProvider)?;
        let stats = sampler::spawn(sampling_loop, ReportSink::new(overlay_dir))?.join()?;

        info!("Application shutting down");
        Ok(stats)
    }
}
