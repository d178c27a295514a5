//! Physical Constants
//!
//! Only what the inertial integrator needs.

/// Gravitational acceleration used to remove gravity from the specific force.
///
/// The integrator subtracts `(0, 0, g)` in the world frame, so this value must
/// match what a level, stationary accelerometer reports after calibration.
///
/// Source: nominal value used by the flight stack (not the 9.80665 standard)
pub const GRAVITY_M_S2: f32 = 9.81;

/// Radians to degrees.
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;
