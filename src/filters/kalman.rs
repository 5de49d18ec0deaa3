use super::PoseFilter;
use crate::{
    constants::{KALMAN_INITIAL_COVARIANCE, KALMAN_MEASUREMENT_NOISE, KALMAN_PROCESS_NOISE},
    Error, Result,
};
use nalgebra::{Matrix3, Matrix3x6, Matrix6, Vector3, Vector6};

/// Kalman filter tracking each angle with a constant-velocity model
pub struct KalmanFilter {
    // State: [pitch, yaw, roll, d_pitch, d_yaw, d_roll]
    state: Vector6<f64>,
    covariance: Matrix6<f64>,
    process_noise: Matrix6<f64>,
    measurement_noise: Matrix3<f64>,
    transition: Matrix6<f64>,
    measurement: Matrix3x6<f64>,
    initialized: bool,
}

impl KalmanFilter {
    /// Filter for samples `dt` seconds apart
    ///
    /// # Errors
    ///
    /// Returns an error if `dt` is not a positive number.
    pub fn new(dt: f64) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(Error::FilterError(format!("Time step must be positive, got {dt}")));
        }

        let mut transition = Matrix6::identity();
        transition.fixed_view_mut::<3, 3>(0, 3).copy_from(&(Matrix3::identity() * dt));

        // Only the angles are measured
        let mut measurement = Matrix3x6::zeros();
        measurement.fixed_view_mut::<3, 3>(0, 0).copy_from(&Matrix3::identity());

        // Piecewise white acceleration
        let q = KALMAN_PROCESS_NOISE;
        let mut process_noise = Matrix6::zeros();
        process_noise
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(Matrix3::identity() * (q * dt.powi(4) / 4.0)));
        process_noise
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(Matrix3::identity() * (q * dt.powi(3) / 2.0)));
        process_noise
            .fixed_view_mut::<3, 3>(3, 0)
            .copy_from(&(Matrix3::identity() * (q * dt.powi(3) / 2.0)));
        process_noise
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&(Matrix3::identity() * (q * dt.powi(2))));

        Ok(Self {
            state: Vector6::zeros(),
            covariance: Matrix6::identity() * KALMAN_INITIAL_COVARIANCE,
            process_noise,
            measurement_noise: Matrix3::identity() * KALMAN_MEASUREMENT_NOISE,
            transition,
            measurement,
            initialized: false,
        })
    }

    fn predict(&mut self) {
        self.state = self.transition * self.state;
        self.covariance = self.transition * self.covariance * self.transition.transpose() + self.process_noise;
    }

    fn update(&mut self, observed: Vector3<f64>) {
        let innovation = observed - self.measurement * self.state;
        let innovation_cov = self.measurement * self.covariance * self.measurement.transpose() + self.measurement_noise;

        // A singular innovation covariance leaves the prediction as is
        let Some(innovation_inv) = innovation_cov.try_inverse() else {
            log::warn!("Kalman innovation covariance is singular, skipping update");
            return;
        };
        let gain = self.covariance * self.measurement.transpose() * innovation_inv;

        self.state += gain * innovation;
        self.covariance = (Matrix6::identity() - gain * self.measurement) * self.covariance;
    }
}

impl PoseFilter for KalmanFilter {
    fn apply(&mut self, angles: [f64; 3]) -> [f64; 3] {
        let observed = Vector3::from(angles);
        if self.initialized {
            self.predict();
            self.update(observed);
        } else {
            self.state.fixed_rows_mut::<3>(0).copy_from(&observed);
            self.initialized = true;
        }
        [self.state[0], self.state[1], self.state[2]]
    }

    fn reset(&mut self) {
        self.state = Vector6::zeros();
        self.covariance = Matrix6::identity() * KALMAN_INITIAL_COVARIANCE;
        self.initialized = false;
    }

    fn name(&self) -> &str {
        "KalmanFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kalman_filter() {
        let mut filter = KalmanFilter::new(0.1).unwrap();

        // First measurement initializes the filter
        assert_eq!(filter.apply([10.0, 20.0, 0.0]), [10.0, 20.0, 0.0]);

        // Subsequent measurements are pulled towards the prediction
        let [p, y, r] = filter.apply([11.0, 21.0, 1.0]);
        assert!(p > 10.0 && p < 11.0);
        assert!(y > 20.0 && y < 21.0);
        assert!(r > 0.0 && r < 1.0);
    }

    #[test]
    fn test_tracks_constant_signal() {
        let mut filter = KalmanFilter::new(0.1).unwrap();
        let mut last = [0.0; 3];
        for _ in 0..50 {
            last = filter.apply([5.0, -5.0, 2.5]);
        }
        assert!((last[0] - 5.0).abs() < 1e-3);
        assert!((last[1] + 5.0).abs() < 1e-3);
        assert!((last[2] - 2.5).abs() < 1e-3);
    }

    #[test]
    fn test_reset() {
        let mut filter = KalmanFilter::new(0.1).unwrap();
        filter.apply([10.0, 10.0, 10.0]);
        filter.apply([12.0, 12.0, 12.0]);
        filter.reset();
        assert_eq!(filter.apply([-30.0, 0.0, 30.0]), [-30.0, 0.0, 30.0]);
    }

    #[test]
    fn test_invalid_dt() {
        assert!(KalmanFilter::new(0.0).is_err());
        assert!(KalmanFilter::new(-1.0).is_err());
        assert!(KalmanFilter::new(f64::INFINITY).is_err());
    }
}
