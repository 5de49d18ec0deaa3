//! Camera capture through `OpenCV`.
//!
//! [`CameraSource`] is a [`FrameSource`] yielding BGR [`Mat`] frames. Pair it
//! with a [`LandmarkProvider`](crate::landmarks::LandmarkProvider) for `Mat`
//! frames to drive the sampling loop from a live camera.

use crate::{
    config::CaptureConfig,
    landmarks::FrameSource,
    utils::safe_cast::{f64_to_u32, u32_to_i32},
    Error, Result,
};
use image::RgbImage;
use opencv::{
    core::{Mat, Vec3b},
    prelude::*,
    videoio::{self, VideoCapture},
};

/// An opened camera device
pub struct CameraSource {
    capture: VideoCapture,
    resolution: (u32, u32),
}

impl CameraSource {
    /// Open `device`, request `width` x `height` and read back what the device actually delivers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CameraAcquisition`] if the device cannot be opened or
    /// reports an unusable resolution.
    pub fn open(device: i32, width: u32, height: u32) -> Result<Self> {
        let mut capture = VideoCapture::new(device, videoio::CAP_ANY)
            .map_err(|e| Error::CameraAcquisition(format!("Cannot open camera {device}: {e}")))?;
        if !capture.is_opened()? {
            return Err(Error::CameraAcquisition(format!("Camera {device} is not available")));
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(width))?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(height))?;

        let actual = (
            f64_to_u32(capture.get(videoio::CAP_PROP_FRAME_WIDTH)?)?,
            f64_to_u32(capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?)?,
        );
        if actual.0 == 0 || actual.1 == 0 {
            return Err(Error::CameraAcquisition(format!(
                "Camera {device} reports an empty resolution"
            )));
        }
        if actual != (width, height) {
            log::warn!(
                "Requested {width}x{height} from camera {device}, got {}x{}",
                actual.0,
                actual.1
            );
        }
        log::info!("Camera {device} opened at {}x{}", actual.0, actual.1);

        Ok(Self {
            capture,
            resolution: actual,
        })
    }

    /// Open the camera named by the capture section of the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for an empty requested resolution, otherwise as [`CameraSource::open`].
    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(Error::ConfigError(format!(
                "Capture resolution must be positive, got {}x{}",
                config.width, config.height
            )));
        }
        Self::open(config.device, config.width, config.height)
    }
}

impl FrameSource for CameraSource {
    type Frame = Mat;

    fn read(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            log::warn!("Camera returned no frame, ending stream");
            return Ok(None);
        }
        let size = frame.size()?;
        if let (Ok(width), Ok(height)) = (u32::try_from(size.width), u32::try_from(size.height)) {
            self.resolution = (width, height);
        }
        Ok(Some(frame))
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}

/// Convert an 8-bit BGR frame to an RGB image for overlay drawing
///
/// # Errors
///
/// Returns an error if the frame is not 3-channel 8-bit.
pub fn frame_to_rgb(frame: &Mat) -> Result<RgbImage> {
    if frame.channels() != 3 {
        return Err(Error::InvalidInput(format!(
            "Expected a 3-channel frame, got {} channels",
            frame.channels()
        )));
    }
    let width = u32::try_from(frame.cols()).map_err(|_| Error::InvalidInput("Negative frame width".to_string()))?;
    let height = u32::try_from(frame.rows()).map_err(|_| Error::InvalidInput("Negative frame height".to_string()))?;

    let mut image = RgbImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let bgr = frame.at_2d::<Vec3b>(u32_to_i32(y)?, u32_to_i32(x)?)?;
        *pixel = image::Rgb([bgr[2], bgr[1], bgr[0]]);
    }
    Ok(image)
}
