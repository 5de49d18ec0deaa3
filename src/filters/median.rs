use super::PoseFilter;
use crate::{Error, Result};
use std::collections::VecDeque;

/// Median filter
pub struct MedianFilter {
    window_size: usize,
    buffer: VecDeque<[f64; 3]>,
}

impl MedianFilter {
    /// # Errors
    ///
    /// Returns an error if `window_size` is zero.
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(Error::FilterError("Window size must be greater than 0".to_string()));
        }
        Ok(Self {
            window_size,
            buffer: VecDeque::with_capacity(window_size),
        })
    }

    fn calculate_median(mut values: Vec<f64>) -> f64 {
        values.sort_by(f64::total_cmp);

        let len = values.len();
        if len == 0 {
            0.0
        } else if len % 2 == 0 {
            (values[len / 2 - 1] + values[len / 2]) / 2.0
        } else {
            values[len / 2]
        }
    }
}

impl PoseFilter for MedianFilter {
    fn apply(&mut self, angles: [f64; 3]) -> [f64; 3] {
        if self.buffer.len() >= self.window_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(angles);

        std::array::from_fn(|i| Self::calculate_median(self.buffer.iter().map(|sample| sample[i]).collect()))
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn name(&self) -> &str {
        "MedianFilter"
    }
}
