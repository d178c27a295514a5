//! Timing Constants
//!
//! Loop rate of the estimator task and limits applied to the external pose stream.

/// Milliseconds per second.
pub const MS_PER_SECOND: f32 = 1000.0;

/// Rate of the estimator task.
///
/// The attitude loop runs at 500 Hz; the estimator runs once per attitude tick.
///
/// Source: stabilizer scheduling of the flight firmware
pub const ESTIMATOR_RATE_HZ: u32 = 500;

/// Nominal time step of the estimator task (1 / 500 Hz).
pub const ESTIMATOR_DT_S: f32 = 1.0 / ESTIMATOR_RATE_HZ as f32;

/// Upper bound on the reported age of the external pose, in seconds.
///
/// Age stops growing here so consumers dividing by it stay bounded.
///
/// Source: pose receiver clamps its age counter at 10 s
pub const MAX_POSE_AGE_S: f32 = 10.0;

/// Upper bound on the reported age of the external pose, in milliseconds.
pub const MAX_POSE_AGE_MS: u32 = 10_000;

/// Pose age after which the estimate is flagged stale, in seconds.
///
/// Motion capture streams at ~100 Hz; ten missed frames means the external
/// reference is gone and velocity-derived control terms should be suppressed.
pub const STALE_POSE_AFTER_S: f32 = 0.1;

/// Smallest interval used when differencing pose positions into velocity, in seconds.
///
/// Two packets arriving in the same radio burst would otherwise produce a
/// huge velocity spike.
///
/// Source: pose receiver velocity estimate (5 ms floor)
pub const MIN_POSE_VELOCITY_DT_S: f32 = 0.005;
