//! Constants for the Strapfuse Estimator
//!
//! Every tuning value and physical constant used by the filter lives here with
//! its unit, its source and what it is for. Runtime configuration
//! ([`crate::fusion::EkfConfig`], [`crate::estimator::EstimatorConfig`]) starts
//! from these values.
//!
//! ## Organization
//!
//! - **Physics**: gravity and unit conversions
//! - **Fusion**: measured noise variances and filter tuning
//! - **Time**: loop rate, pose-stream timing limits
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. Names carry units (`_S`, `_MS`, `_M_S2`)
//! 3. Variances are squared units, not standard deviations

/// Physical constants and unit conversions.
pub mod physics;

/// Noise variances and filter tuning defaults.
pub mod fusion;

/// Loop rate and pose-stream timing.
pub mod time;

// Re-export commonly used constants for convenience
pub use physics::{GRAVITY_M_S2, RAD_TO_DEG};

pub use fusion::{
    ACCEL_VARIANCE, GYRO_VARIANCE, POSE_ATTITUDE_VARIANCE, POSE_POSITION_VARIANCE,
    POSE_VELOCITY_VARIANCE,
};

pub use time::{ESTIMATOR_DT_S, ESTIMATOR_RATE_HZ, MAX_POSE_AGE_MS, MAX_POSE_AGE_S};
