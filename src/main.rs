//! Head pose estimation from recorded facial landmark streams.

use anyhow::{Context, Result};
use clap::Parser;
use head_pose_pnp::{
    app::{AppConfig, HeadPoseApp, InputSource},
    config::Config,
    correspondence::CorrespondenceVariant,
    seeding::SeedingStrategy,
    solver::SolverBackend,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Recorded landmark file to replay (one frame per line)
    #[arg(short, long, required_unless_present = "print_config")]
    landmarks: Option<PathBuf>,

    /// Landmark subset fed to the solver (four_point, six_point)
    #[arg(long)]
    variant: Option<CorrespondenceVariant>,

    /// Solver start (heuristic_left_right, none)
    #[arg(long)]
    seeding: Option<SeedingStrategy>,

    /// Solver backend (levenberg_marquardt, opencv)
    #[arg(long)]
    backend: Option<SolverBackend>,

    /// Smoothing filter spec, e.g. none, exponential:0.3, median:5, kalman
    #[arg(short, long)]
    filter: Option<String>,

    /// Delay between samples in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Frame width the landmarks were recorded at
    #[arg(long)]
    width: Option<u32>,

    /// Frame height the landmarks were recorded at
    #[arg(long)]
    height: Option<u32>,

    /// Write an overlay image per estimated frame into this directory
    #[arg(short, long)]
    overlay: Option<PathBuf>,

    /// Retry a failed solve with the other landmark subset
    #[arg(long)]
    retry_alternate: bool,

    /// Abort on short landmark sets instead of skipping the frame
    #[arg(long)]
    strict: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    /// Command line values take precedence over the config file
    fn apply(&self, settings: &mut Config) {
        if let Some(variant) = self.variant {
            settings.estimation.variant = variant;
        }
        if let Some(seeding) = self.seeding {
            settings.estimation.seeding = seeding;
        }
        if let Some(backend) = self.backend {
            settings.estimation.backend = backend;
        }
        if let Some(filter) = &self.filter {
            settings.smoothing.filter.clone_from(filter);
        }
        if let Some(interval) = self.interval_ms {
            settings.capture.sample_interval_ms = interval;
        }
        if let Some(width) = self.width {
            settings.capture.width = width;
        }
        if let Some(height) = self.height {
            settings.capture.height = height;
        }
        if let Some(dir) = &self.overlay {
            settings.overlay.enabled = true;
            settings.overlay.output_dir.clone_from(dir);
        }
        if self.retry_alternate {
            settings.estimation.retry_alternate_variant = true;
        }
        if self.strict {
            settings.estimation.strict_landmarks = true;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    let mut settings = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => Config::default(),
    };
    args.apply(&mut settings);

    if args.print_config {
        print!("{}", settings.to_yaml()?);
        return Ok(());
    }

    let Some(landmarks) = args.landmarks else {
        anyhow::bail!("--landmarks is required");
    };

    info!("Head pose estimation ({} correspondences)", settings.estimation.variant);
    let app = HeadPoseApp::new(AppConfig {
        input: InputSource::Recorded(landmarks),
        settings,
    })?;
    let stats = app.run()?;

    println!(
        "{} samples: {} poses, {} without face, {} skipped",
        stats.samples, stats.poses, stats.no_face, stats.skipped
    );
    if stats.samples > 0 && stats.poses == 0 {
        log::warn!("No pose could be estimated from the recording");
    }

    Ok(())
}
