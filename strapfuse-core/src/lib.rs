//! Inertial + motion-capture state estimation for Strapfuse
//!
//! Fuses a 500 Hz IMU with an external pose stream into position, velocity
//! and attitude for the flight controller, using an error-state EKF.
//!
//! Key constraints:
//! - Runs inside the fixed-rate attitude task on a Cortex-M4F
//! - No heap allocation, no locks, bounded time per tick
//! - Last good estimate stays published when a step fails
//!
//! ```no_run
//! use strapfuse_core::{Estimator, EstimatorConfig, InertialSample};
//! use strapfuse_core::pose::ExternalPoseTracker;
//! use strapfuse_core::spatial::{Quat, Vec3};
//! use strapfuse_core::time::FixedTime;
//!
//! let clock = FixedTime::new(0);
//! let mut tracker = ExternalPoseTracker::new();
//! let mut estimator = Estimator::new(EstimatorConfig::default());
//!
//! // radio task
//! tracker.receive(Vec3::ZERO, Quat::IDENTITY, &clock).ok();
//!
//! // attitude task, every 2 ms
//! let sample = InertialSample::new(Vec3::new(0.0, 0.0, 9.81), Vec3::ZERO, 0.002);
//! match estimator.tick(sample, tracker.take_fresh()) {
//!     Ok(_) => {}, // estimate published
//!     Err(e) => {}, // hold last estimate
//! }
//! let estimate = estimator.estimate();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod logging;

pub mod buffer;
pub mod constants;
pub mod errors;
pub mod estimator;
pub mod fusion;
pub mod pose;
pub mod spatial;
pub mod time;

// Public API
pub use errors::{
    CorrectionError, CorrectionResult, EstimatorError, EstimatorResult, FilterStage,
    NotPositiveDefinite,
};
pub use estimator::{
    Attitude, Diagnostics, Estimate, Estimator, EstimatorConfig, InertialSample, InitMode, Phase,
    TickOutcome,
};
pub use fusion::{Ekf, EkfConfig, FilterState, Integration, PoseObservation};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
