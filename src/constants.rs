//! Constants used throughout the application

/// Number of facial landmarks for full face
pub const NUM_FACIAL_LANDMARKS: usize = 68;

/// Landmark indices in the iBUG 68-point convention
pub const CHIN: usize = 8;
pub const NOSE_TIP: usize = 30;
pub const LEFT_EYE_OUTER_CORNER: usize = 36;
pub const RIGHT_EYE_OUTER_CORNER: usize = 45;
pub const LEFT_MOUTH_CORNER: usize = 48;
pub const RIGHT_MOUTH_CORNER: usize = 54;

/// Default capture resolution requested from the camera
pub const DEFAULT_CAPTURE_WIDTH: u32 = 640;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 480;

/// Camera matrix center factor
pub const CAMERA_CENTER_FACTOR: f64 = 2.0;

/// Number of (zero) lens distortion coefficients passed to the solver
pub const DISTORTION_COEFFS_LEN: usize = 4;

/// Delay between the end of one sample and the start of the next
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;

/// Initial rotation vector when the head appears turned to the left
pub const LEFT_TURN_ROTATION_SEED: [f64; 3] = [-1.0, -0.75, -3.0];

/// Initial rotation vector when the head appears turned to the right
pub const RIGHT_TURN_ROTATION_SEED: [f64; 3] = [1.0, -0.75, -3.0];

/// Initial translation: roughly a metre away with a lateral offset
pub const TRANSLATION_SEED: [f64; 3] = [-100.0, 100.0, 1000.0];

/// Solver defaults
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_MAX_REPROJECTION_ERROR: f64 = 25.0;

/// Default filter parameters
pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 5;
pub const DEFAULT_MEDIAN_WINDOW: usize = 5;
pub const DEFAULT_EXPONENTIAL_ALPHA: f64 = 0.5;

/// Exponential filter bounds
pub const EXPONENTIAL_ALPHA_MIN: f64 = 0.0;
pub const EXPONENTIAL_ALPHA_MAX: f64 = 1.0;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;

/// Kalman filter defaults: time step matches the default sampling cadence
pub const DEFAULT_KALMAN_DT: f64 = 0.1;
pub const KALMAN_PROCESS_NOISE: f64 = 0.1;
pub const KALMAN_MEASUREMENT_NOISE: f64 = 1.0;
pub const KALMAN_INITIAL_COVARIANCE: f64 = 1000.0;
