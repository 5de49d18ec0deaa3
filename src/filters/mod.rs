//! Temporal smoothing for per-frame pose angles.
//!
//! Every estimate is computed from a single frame, so the reported angles
//! jitter with landmark noise. A [`PoseFilter`] smooths the three presented
//! angles across frames. Smoothing is off unless configured, and the sampler
//! resets the filter whenever the face is lost.

/// Kalman filter with a per-axis constant-velocity model
pub mod kalman;

/// Moving average filter for simple smoothing
pub mod moving_average;

/// Median filter for outlier rejection
pub mod median;

/// Exponential filter for responsive smoothing
pub mod exponential;

use crate::{
    constants::{DEFAULT_EXPONENTIAL_ALPHA, DEFAULT_KALMAN_DT, DEFAULT_MEDIAN_WINDOW, DEFAULT_MOVING_AVERAGE_WINDOW},
    Error, Result,
};

/// Smoothing over a stream of three-angle samples
pub trait PoseFilter: Send + Sync {
    /// Feed one sample and get the smoothed value back
    fn apply(&mut self, angles: [f64; 3]) -> [f64; 3];

    /// Forget all history
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes through values unchanged
pub struct NoFilter;

impl PoseFilter for NoFilter {
    fn apply(&mut self, angles: [f64; 3]) -> [f64; 3] {
        angles
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

fn parse_param<T: std::str::FromStr>(filter: &str, param: &str) -> Result<T> {
    param
        .trim()
        .parse()
        .map_err(|_| Error::FilterError(format!("Invalid parameter '{param}' for {filter} filter")))
}

/// Create a filter from a `name[:param]` spec.
///
/// Recognised: `none`, `exponential[:alpha]`, `moving_average[:window]`,
/// `median[:window]`, `kalman[:dt]`.
///
/// # Errors
///
/// Returns [`Error::FilterError`] for unknown names and out-of-range parameters.
pub fn create_filter(spec: &str) -> Result<Box<dyn PoseFilter>> {
    let (name, param) = match spec.split_once(':') {
        Some((name, param)) => (name, Some(param)),
        None => (spec, None),
    };

    match name.trim().to_lowercase().replace('-', "_").as_str() {
        "none" | "nofilter" | "off" => match param {
            None => Ok(Box::new(NoFilter)),
            Some(p) => Err(Error::FilterError(format!("Filter 'none' takes no parameter, got '{p}'"))),
        },
        "exponential" => {
            let alpha = param.map_or(Ok(DEFAULT_EXPONENTIAL_ALPHA), |p| parse_param("exponential", p))?;
            Ok(Box::new(exponential::ExponentialFilter::new(alpha)?))
        }
        "moving_average" | "movingaverage" => {
            let window = param.map_or(Ok(DEFAULT_MOVING_AVERAGE_WINDOW), |p| parse_param("moving_average", p))?;
            Ok(Box::new(moving_average::MovingAverageFilter::new(window)?))
        }
        "median" => {
            let window = param.map_or(Ok(DEFAULT_MEDIAN_WINDOW), |p| parse_param("median", p))?;
            Ok(Box::new(median::MedianFilter::new(window)?))
        }
        "kalman" => {
            let dt = param.map_or(Ok(DEFAULT_KALMAN_DT), |p| parse_param("kalman", p))?;
            Ok(Box::new(kalman::KalmanFilter::new(dt)?))
        }
        _ => Err(Error::FilterError(format!("Unknown filter type: {spec}"))),
    }
}
