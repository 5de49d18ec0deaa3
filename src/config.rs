//! Configuration management for the head pose estimator

use crate::{
    constants::{DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH, DEFAULT_SAMPLE_INTERVAL_MS},
    correspondence::CorrespondenceVariant,
    filters::PoseFilter,
    seeding::{SeedConstants, SeedingStrategy},
    solver::{SolverBackend, SolverParams},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame source configuration
    pub capture: CaptureConfig,

    /// Pose estimation configuration
    pub estimation: EstimationConfig,

    /// Temporal smoothing configuration
    pub smoothing: SmoothingConfig,

    /// Snapshot rendering configuration
    pub overlay: OverlayConfig,
}

/// Frame source and sampling cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index, read by `capture::CameraSource::from_config`
    pub device: i32,

    /// Requested capture width
    pub width: u32,

    /// Requested capture height
    pub height: u32,

    /// Delay after each sample completes before the next one starts
    pub sample_interval_ms: u64,
}

/// Pose estimation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    /// Landmark subset fed to the solver
    pub variant: CorrespondenceVariant,

    /// How the solver is started
    pub seeding: SeedingStrategy,

    /// Seed poses for the left/right heuristic
    pub seeds: SeedConstants,

    /// Solver implementation
    pub backend: SolverBackend,

    /// Solver tuning
    pub solver: SolverParams,

    /// Retry a failed solve once with the other correspondence variant
    pub retry_alternate_variant: bool,

    /// Abort the loop on a short landmark set instead of skipping the frame
    pub strict_landmarks: bool,
}

/// Smoothing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Filter spec, e.g. `none`, `exponential:0.3`, `median:5`
    pub filter: String,
}

/// Overlay snapshot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Write an overlay image for every estimated frame
    pub enabled: bool,

    /// Directory the snapshots go to
    pub output_dir: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: 0,
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
        }
    }
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            variant: CorrespondenceVariant::FourPoint,
            seeding: SeedingStrategy::HeuristicLeftRight,
            seeds: SeedConstants::default(),
            backend: SolverBackend::LevenbergMarquardt,
            solver: SolverParams::default(),
            retry_alternate_variant: false,
            strict_landmarks: cfg!(debug_assertions),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            filter: "none".to_string(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: PathBuf::from("snapshots"),
        }
    }
}

impl CaptureConfig {
    #[must_use]
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for this schema.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not match the schema.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Serialize to YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))
    }

    /// Create the configured smoothing filter
    ///
    /// # Errors
    ///
    /// Returns an error if the filter spec is invalid.
    pub fn create_filter(&self) -> Result<Box<dyn PoseFilter>> {
        crate::filters::create_filter(&self.smoothing.filter)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(Error::ConfigError(format!(
                "Capture resolution must be positive, got {}x{}",
                self.capture.width, self.capture.height
            )));
        }
        if self.capture.sample_interval_ms == 0 {
            return Err(Error::ConfigError(
                "Sample interval must be greater than 0".to_string(),
            ));
        }

        let seeds = &self.estimation.seeds;
        let all_finite = seeds
            .left_rotation
            .iter()
            .chain(&seeds.right_rotation)
            .chain(&seeds.translation)
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::ConfigError("Seed values must be finite".to_string()));
        }
        if seeds.translation[2] <= 0.0 {
            return Err(Error::ConfigError(
                "Seed translation must place the head in front of the camera (z > 0)".to_string(),
            ));
        }

        self.estimation.solver.validate()?;

        self.create_filter()
            .map_err(|e| Error::ConfigError(format!("Invalid smoothing filter: {e}")))?;

        if self.overlay.enabled && self.overlay.output_dir.as_os_str().is_empty() {
            return Err(Error::ConfigError(
                "Overlay output directory must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head Pose Estimation Configuration

# Frame source
capture:
  device: 0
  width: 640
  height: 480
  sample_interval_ms: 100

# Pose estimation
estimation:
  variant: four_point            # four_point | six_point
  seeding: heuristic_left_right  # none | heuristic_left_right
  seeds:
    left_rotation: [-1.0, -0.75, -3.0]
    right_rotation: [1.0, -0.75, -3.0]
    translation: [-100.0, 100.0, 1000.0]
  backend: levenberg_marquardt   # levenberg_marquardt | opencv
  solver:
    max_iterations: 100
    max_reprojection_error: 25.0
  retry_alternate_variant: false
  strict_landmarks: false

# Temporal smoothing: none | exponential[:alpha] | moving_average[:window] | median[:window] | kalman[:dt]
smoothing:
  filter: "none"

# Overlay snapshots
overlay:
  enabled: false
  output_dir: "snapshots"
"#;
