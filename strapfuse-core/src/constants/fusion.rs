//! Fusion Algorithm Constants
//!
//! Measured sensor noise and filter tuning defaults. All variances are in
//! squared SI units and can be overridden at runtime through
//! [`crate::fusion::EkfConfig`].

// ===== EXTERNAL POSE MEASUREMENT NOISE (R) =====

/// Motion-capture position variance (m²).
///
/// Sub-millimetre tracking; the filter trusts position almost completely.
///
/// Source: measured on the motion-capture volume
pub const POSE_POSITION_VARIANCE: f32 = 1.5e-7;

/// Variance of the finite-difference velocity from the pose stream ((m/s)²).
///
/// Source: measured, differencing at ~100 Hz
pub const POSE_VELOCITY_VARIANCE: f32 = 2e-4;

/// Motion-capture attitude error variance (rad²).
///
/// Source: measured, includes quaternion compression loss on the radio link
pub const POSE_ATTITUDE_VARIANCE: f32 = 4.5e-3;

// ===== INERTIAL PROCESS NOISE (Qd) =====

/// Gyroscope noise variance per axis ((rad/s)²).
///
/// Source: measured at rest
pub const GYRO_VARIANCE: f32 = 0.2e-4;

/// Accelerometer noise variance per axis ((m/s²)²).
///
/// The z axis measured noticeably higher; the axes are averaged to keep a
/// single isotropic value.
///
/// Source: measured at rest
pub const ACCEL_VARIANCE: f32 = 2.4e-3;

// ===== FILTER TUNING =====

/// Diagonal of the covariance at initialization.
pub const INITIAL_COVARIANCE: f32 = 1.0;

/// Weight of the newest sample in the smoothed world acceleration.
///
/// `a_smooth = (1 - α)·a_smooth + α·a_world`
pub const ACCEL_SMOOTHING_ALPHA: f32 = 0.3;

/// Smallest scalar part of the relative quaternion accepted in a correction.
///
/// The attitude residual divides by this value; below it the relative
/// rotation is within a fraction of a degree of 180° and the small-angle
/// residual is meaningless.
pub const MIN_RESIDUAL_SCALAR: f32 = 1e-3;
