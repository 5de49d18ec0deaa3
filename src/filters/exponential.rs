use super::PoseFilter;
use crate::{
    constants::{EXPONENTIAL_ALPHA_MAX, EXPONENTIAL_ALPHA_MIN},
    Error, Result,
};

/// Exponential smoothing filter
pub struct ExponentialFilter {
    alpha: f64,
    last: Option<[f64; 3]>,
}

impl ExponentialFilter {
    /// # Errors
    ///
    /// Returns an error unless `alpha` lies in `(0, 1]`.
    pub fn new(alpha: f64) -> Result<Self> {
        if !(alpha > EXPONENTIAL_ALPHA_MIN && alpha <= EXPONENTIAL_ALPHA_MAX) {
            return Err(Error::FilterError(format!("Alpha must be in (0, 1], got {alpha}")));
        }
        Ok(Self { alpha, last: None })
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl PoseFilter for ExponentialFilter {
    fn apply(&mut self, angles: [f64; 3]) -> [f64; 3] {
        let filtered = match self.last {
            Some(last) => std::array::from_fn(|i| self.alpha * angles[i] + (1.0 - self.alpha) * last[i]),
            None => angles,
        };
        self.last = Some(filtered);
        filtered
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
