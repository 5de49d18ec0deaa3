//! Fixed-cadence sampling loop.
//!
//! Each sample reads a frame, asks the landmark provider for a face, and runs
//! the pose estimator when one is found. The next sample starts a fixed delay
//! after the previous one completed, so samples never overlap. The loop stops
//! when its [`StopHandle`] is triggered or dropped, or when the frame source
//! runs out.

use crate::{
    camera::CameraIntrinsics,
    config::Config,
    correspondence::CorrespondenceVariant,
    filters::{NoFilter, PoseFilter},
    landmarks::{FrameSource, LandmarkProvider, LandmarkSet},
    pose_estimation::{PoseEstimate, PoseEstimator},
    Error, Result,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Requests the loop to stop. Dropping it has the same effect.
#[derive(Debug)]
pub struct StopHandle {
    sender: Sender<()>,
}

/// Loop side of a [`StopHandle`]
#[derive(Debug, Clone)]
pub struct StopSignal {
    receiver: Receiver<()>,
}

/// Create a connected stop handle and signal
#[must_use]
pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (sender, receiver) = bounded(1);
    (StopHandle { sender }, StopSignal { receiver })
}

impl StopHandle {
    /// Stop the loop. It finishes the sample in progress, if any, and exits.
    pub fn stop(self) {
        // Full channel or gone receiver both mean the loop already knows
        let _ = self.sender.try_send(());
    }
}

impl StopSignal {
    /// Whether a stop was requested, without waiting
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        match self.receiver.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => true,
            Err(TryRecvError::Empty) => false,
        }
    }

    /// Sleep for `timeout` unless a stop arrives first. Returns `true` on stop.
    #[must_use]
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

/// What one sample produced
#[derive(Debug, Clone)]
pub enum SampleOutcome {
    /// A face was found and its pose estimated
    Pose {
        estimate: PoseEstimate,
        /// Presented angles after smoothing, degrees
        angles: [f64; 3],
        landmarks: LandmarkSet,
    },
    /// The provider found no face in the frame
    NoFace,
    /// The frame was dropped (solver failure, divergence, bad landmarks)
    Skipped { reason: String },
}

/// One completed sample
#[derive(Debug, Clone)]
pub struct Sample {
    /// Zero-based sample counter
    pub index: usize,
    /// Time since the loop started
    pub elapsed: Duration,
    /// Camera model in effect for this frame
    pub camera: CameraIntrinsics,
    pub outcome: SampleOutcome,
}

/// Receives every completed sample
pub trait SampleSink {
    /// Handle one sample.
    ///
    /// # Errors
    ///
    /// An error stops the loop and is returned from [`SamplingLoop::run`].
    fn on_sample(&mut self, sample: &Sample) -> Result<()>;
}

impl<T> SampleSink for T
where
    T: FnMut(&Sample) -> Result<()>,
{
    fn on_sample(&mut self, sample: &Sample) -> Result<()> {
        self(sample)
    }
}

/// Counters over a loop's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub samples: usize,
    pub poses: usize,
    pub no_face: usize,
    pub skipped: usize,
    /// Whether the loop ended because the frame source ran out
    pub end_of_stream: bool,
}

impl LoopStats {
    fn record(&mut self, outcome: &SampleOutcome) {
        self.samples += 1;
        match outcome {
            SampleOutcome::Pose { .. } => self.poses += 1,
            SampleOutcome::NoFace => self.no_face += 1,
            SampleOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// The sampling pipeline: frame source, landmark provider, estimator, filter
pub struct SamplingLoop<S, P> {
    source: S,
    provider: P,
    estimator: PoseEstimator,
    variant: CorrespondenceVariant,
    filter: Box<dyn PoseFilter>,
    interval: Duration,
    strict_landmarks: bool,
}

impl<S, P> SamplingLoop<S, P>
where
    S: FrameSource,
    P: LandmarkProvider<S::Frame>,
{
    /// Loop with no smoothing, the default interval and lenient landmark handling
    #[must_use]
    pub fn new(source: S, provider: P, estimator: PoseEstimator, variant: CorrespondenceVariant) -> Self {
        Self {
            source,
            provider,
            estimator,
            variant,
            filter: Box::new(NoFilter),
            interval: Duration::from_millis(crate::constants::DEFAULT_SAMPLE_INTERVAL_MS),
            strict_landmarks: false,
        }
    }

    /// Wire a loop from configuration, sizing the camera model to the source
    ///
    /// # Errors
    ///
    /// Returns an error if the estimator or filter cannot be built.
    pub fn from_config(config: &Config, source: S, provider: P) -> Result<Self> {
        let (width, height) = source.resolution();
        let estimator = PoseEstimator::from_config(&config.estimation, width, height)?;
        Ok(Self::new(source, provider, estimator, config.estimation.variant)
            .with_filter(config.create_filter()?)
            .with_interval(config.capture.sample_interval())
            .with_strict_landmarks(config.estimation.strict_landmarks))
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Box<dyn PoseFilter>) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_strict_landmarks(mut self, strict: bool) -> Self {
        self.strict_landmarks = strict;
        self
    }

    /// Run on the current thread until stopped or the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame source breaks, the sink fails, or a
    /// short landmark set is seen in strict mode. Per-frame solver problems
    /// and empty frame resolutions only skip the frame.
    pub fn run<K: SampleSink + ?Sized>(mut self, stop: &StopSignal, sink: &mut K) -> Result<LoopStats> {
        let started = Instant::now();
        let mut stats = LoopStats::default();
        log::info!(
            "Sampling loop started: {} correspondences, {}ms interval, {} filter",
            self.variant,
            self.interval.as_millis(),
            self.filter.name()
        );

        while !stop.is_stopped() {
            let Some(frame) = self.source.read()? else {
                log::info!("Frame source exhausted after {} samples", stats.samples);
                stats.end_of_stream = true;
                break;
            };
            let (width, height) = self.source.resolution();
            let outcome = match self.estimator.set_resolution(width, height) {
                Ok(_) => self.sample(&frame)?,
                Err(e) => {
                    log::warn!("Skipping frame with unusable resolution {width}x{height}: {e}");
                    SampleOutcome::Skipped { reason: e.to_string() }
                }
            };
            stats.record(&outcome);
            let sample = Sample {
                index: stats.samples - 1,
                elapsed: started.elapsed(),
                camera: *self.estimator.camera(),
                outcome,
            };
            sink.on_sample(&sample)?;

            if stop.wait(self.interval) {
                break;
            }
        }

        log::info!(
            "Sampling loop finished: {} samples, {} poses, {} without face, {} skipped",
            stats.samples,
            stats.poses,
            stats.no_face,
            stats.skipped
        );
        Ok(stats)
    }

    fn sample(&mut self, frame: &S::Frame) -> Result<SampleOutcome> {
        let landmarks = match self.provider.detect(frame) {
            Ok(Some(landmarks)) => landmarks,
            Ok(None) => {
                log::debug!("No face detected");
                self.filter.reset();
                return Ok(SampleOutcome::NoFace);
            }
            Err(e) => {
                log::warn!("Landmark detection failed, skipping frame: {e}");
                return Ok(SampleOutcome::Skipped { reason: e.to_string() });
            }
        };

        match self.estimator.estimate(&landmarks, self.variant) {
            Ok(estimate) => {
                let angles = self.filter.apply(estimate.presentation_angles());
                log::debug!(
                    "Pose angles [{:.1}, {:.1}, {:.1}] deg",
                    angles[0],
                    angles[1],
                    angles[2]
                );
                Ok(SampleOutcome::Pose {
                    estimate,
                    angles,
                    landmarks,
                })
            }
            Err(e @ Error::InvalidLandmarks { .. }) => {
                if self.strict_landmarks {
                    return Err(e);
                }
                log::error!("Skipping frame: {e}");
                Ok(SampleOutcome::Skipped { reason: e.to_string() })
            }
            Err(e) if e.is_frame_local() => {
                log::warn!("Skipping frame: {e}");
                Ok(SampleOutcome::Skipped { reason: e.to_string() })
            }
            Err(e) => Err(e),
        }
    }
}

/// A sampling loop running on its own thread. Dropping the handle stops and joins it.
pub struct SamplerHandle {
    stop: Option<StopHandle>,
    thread: Option<JoinHandle<Result<LoopStats>>>,
}

/// Move `sampling_loop` onto a worker thread, feeding `sink`
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn<S, P, K>(sampling_loop: SamplingLoop<S, P>, mut sink: K) -> Result<SamplerHandle>
where
    S: FrameSource + Send + 'static,
    P: LandmarkProvider<S::Frame> + Send + 'static,
    K: SampleSink + Send + 'static,
{
    let (stop, signal) = stop_pair();
    let thread = std::thread::Builder::new()
        .name("head-pose-sampler".to_string())
        .spawn(move || sampling_loop.run(&signal, &mut sink))?;
    Ok(SamplerHandle {
        stop: Some(stop),
        thread: Some(thread),
    })
}

impl SamplerHandle {
    /// Whether the loop has already exited on its own
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the loop and wait for it
    ///
    /// # Errors
    ///
    /// Returns the loop's own error, or [`Error::SamplerPanicked`].
    pub fn stop(mut self) -> Result<LoopStats> {
        if let Some(stop) = self.stop.take() {
            stop.stop();
        }
        self.join_thread()
    }

    /// Wait for the loop to end by itself (end of stream or error)
    ///
    /// # Errors
    ///
    /// Returns the loop's own error, or [`Error::SamplerPanicked`].
    pub fn join(mut self) -> Result<LoopStats> {
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<LoopStats> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| Error::SamplerPanicked)?,
            None => Ok(LoopStats::default()),
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Err(e) = self.join_thread() {
            log::error!("Sampling loop ended with error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn test_stop_signal_states() {
        let (handle, signal) = stop_pair();
        assert!(!signal.is_stopped());
        assert!(!signal.wait(Duration::from_millis(1)));

        handle.stop();
        assert!(signal.is_stopped());
        // Sender is gone now, so the signal stays raised
        assert!(signal.is_stopped());
        assert!(signal.wait(Duration::from_secs(5)));
    }

    #[test]
    fn test_dropped_handle_stops() {
        let (handle, signal) = stop_pair();
        drop(handle);
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_stats_record() {
        let mut stats = LoopStats::default();
        stats.record(&SampleOutcome::NoFace);
        stats.record(&SampleOutcome::Skipped {
            reason: "x".to_string(),
        });
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.no_face, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.poses, 0);
    }

    struct Frames(Vec<Option<LandmarkSet>>);

    impl FrameSource for Frames {
        type Frame = Option<LandmarkSet>;

        fn read(&mut self) -> Result<Option<Self::Frame>> {
            Ok((!self.0.is_empty()).then(|| self.0.remove(0)))
        }

        fn resolution(&self) -> (u32, u32) {
            (640, 480)
        }
    }

    fn passthrough(frame: &Option<LandmarkSet>) -> Result<Option<LandmarkSet>> {
        Ok(frame.clone())
    }

    #[test]
    fn test_strict_mode_aborts_on_short_set() {
        let short = Some(LandmarkSet::new(vec![Point2::origin(); 10]));
        let estimator = PoseEstimator::new(640, 480).unwrap();
        let (_handle, signal) = stop_pair();
        let mut sink = |_: &Sample| -> Result<()> { Ok(()) };

        let lenient = SamplingLoop::new(
            Frames(vec![short.clone(), None]),
            passthrough,
            estimator,
            CorrespondenceVariant::FourPoint,
        )
        .with_interval(Duration::ZERO);
        let stats = lenient.run(&signal, &mut sink).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.no_face, 1);
        assert!(stats.end_of_stream);

        let strict = SamplingLoop::new(
            Frames(vec![short]),
            passthrough,
            PoseEstimator::new(640, 480).unwrap(),
            CorrespondenceVariant::FourPoint,
        )
        .with_interval(Duration::ZERO)
        .with_strict_landmarks(true);
        assert!(matches!(
            strict.run(&signal, &mut sink),
            Err(Error::InvalidLandmarks { .. })
        ));
    }
}
