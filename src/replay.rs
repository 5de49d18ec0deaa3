//! Recorded landmark streams.
//!
//! A recording is a text file with one frame per line. A frame is either `-`
//! or `none` (no face in that frame) or a flat list of `x y` coordinates,
//! separated by whitespace or commas. Blank lines and `#` comments are
//! ignored.
//!
//! ```text
//! # frame 0: no face
//! -
//! # frame 1
//! 101.5 220.0, 103.2 240.8, ...
//! ```

use crate::{
    landmarks::{FrameSource, LandmarkProvider, LandmarkSet},
    Error, Result,
};
use nalgebra::Point2;
use std::collections::VecDeque;
use std::path::Path;

/// One line of a recording
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    /// One-based line number in the source file
    pub line: usize,
    /// `None` when the recording says no face was found
    pub landmarks: Option<LandmarkSet>,
}

/// A [`FrameSource`] replaying landmark sets from a file
#[derive(Debug, Clone)]
pub struct RecordedLandmarks {
    frames: VecDeque<RecordedFrame>,
    resolution: (u32, u32),
}

impl RecordedLandmarks {
    /// Load a recording made at `width` x `height`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CameraAcquisition`] if the file cannot be read and
    /// [`Error::InvalidInput`] if a line is malformed.
    pub fn open<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::CameraAcquisition(format!("Cannot open landmark recording {}: {e}", path.display())))?;
        let recording = Self::parse(&content, width, height)?;
        log::info!("Loaded {} frames from {}", recording.len(), path.display());
        Ok(recording)
    }

    /// Parse recording text
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first malformed line.
    pub fn parse(content: &str, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "Recording resolution must be positive, got {width}x{height}"
            )));
        }

        let mut frames = VecDeque::new();
        for (idx, raw) in content.lines().enumerate() {
            let line = idx + 1;
            let text = raw.split_once('#').map_or(raw, |(before, _)| before).trim();
            if text.is_empty() {
                continue;
            }
            let landmarks = parse_frame(text).map_err(|msg| Error::InvalidInput(format!("Line {line}: {msg}")))?;
            frames.push_back(RecordedFrame { line, landmarks });
        }

        Ok(Self {
            frames,
            resolution: (width, height),
        })
    }

    /// Frames not yet read
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn parse_frame(text: &str) -> std::result::Result<Option<LandmarkSet>, String> {
    if text == "-" || text.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    let values = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("'{token}' is not a coordinate"))
        })
        .collect::<std::result::Result<Vec<f64>, String>>()?;

    if values.len() % 2 != 0 {
        return Err(format!("odd number of coordinates ({})", values.len()));
    }

    Ok(Some(LandmarkSet::new(
        values.chunks_exact(2).map(|xy| Point2::new(xy[0], xy[1])).collect(),
    )))
}

impl FrameSource for RecordedLandmarks {
    type Frame = RecordedFrame;

    fn read(&mut self) -> Result<Option<RecordedFrame>> {
        Ok(self.frames.pop_front())
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}

/// Hands back the landmarks stored in each recorded frame
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordedLandmarkProvider;

impl LandmarkProvider<RecordedFrame> for RecordedLandmarkProvider {
    fn detect(&mut self, frame: &RecordedFrame) -> Result<Option<LandmarkSet>> {
        log::trace!("Replaying line {}", frame.line);
        Ok(frame.landmarks.clone())
    }
}
