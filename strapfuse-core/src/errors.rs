//! Error Types for Filter Failures
//!
//! ## Design Philosophy
//!
//! The filter runs inside a fixed-rate flight task, so errors follow the same
//! rules as the rest of the hot path:
//!
//! 1. **Small Size**: every variant is a few bytes; errors are returned every
//!    tick in the worst case.
//!
//! 2. **No Heap Allocation**: no `String`, only `&'static str` and plain numbers.
//!
//! 3. **Copy Semantics**: errors are `Copy` so they can be stored in diagnostics
//!    without ownership games.
//!
//! 4. **Recoverability is in the type**: the caller can tell from the variant
//!    whether to keep flying on the predicted state or to escalate.
//!
//! ## Error Categories
//!
//! ### Recoverable (correction skipped, predicted state published)
//! - `CorrectionError::SingularInnovation`: `P + R` is not positive definite
//! - `CorrectionError::DegenerateResidual`: attitude residual undefined (~180°)
//! - `CorrectionError::InvalidObservation`: pose contains NaN/Inf or a zero quaternion
//!
//! ### Fatal for the step (last good state stays published)
//! - `EstimatorError::NumericalDegeneracy`: NaN/Inf in state or covariance
//!
//! ### Caller mistakes
//! - `EstimatorError::InvalidSample`: IMU sample with NaN/Inf or `dt <= 0`
//!
//! Staleness of the external pose is deliberately *not* an error; it is
//! exposed as an age on the published estimate.
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use strapfuse_core::{Estimator, EstimatorError, InertialSample, TickOutcome};
//!
//! fn on_tick(estimator: &mut Estimator, sample: InertialSample) {
//!     match estimator.tick(sample, None) {
//!         Ok(TickOutcome::CorrectionSkipped(_)) => {
//!             // Flying on prediction only this tick; counted in diagnostics
//!         }
//!         Ok(_) => {}
//!         Err(EstimatorError::NumericalDegeneracy { .. }) => {
//!             // Hold last good estimate, hand control to the safety layer
//!             // enter_safe_mode();
//!         }
//!         Err(_) => {
//!             // Bad input sample - drop it
//!         }
//!     }
//! }
//! ```

use thiserror_no_std::Error;

/// Result type for correction operations
pub type CorrectionResult<T> = Result<T, CorrectionError>;

/// Result type for estimator operations
pub type EstimatorResult<T> = Result<T, EstimatorError>;

/// Cholesky factorization hit a pivot that is not strictly positive
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("matrix not positive definite at pivot {pivot}")]
pub struct NotPositiveDefinite {
    /// Row/column of the failing pivot
    pub pivot: usize,
}

/// Which filter step produced a non-finite value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    /// Inertial propagation
    Propagation,
    /// External pose correction
    Correction,
}

impl core::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Propagation => f.write_str("propagation"),
            Self::Correction => f.write_str("correction"),
        }
    }
}

/// Correction-step failures
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CorrectionError {
    /// Innovation covariance `P + R` could not be factored
    #[error("innovation covariance singular at pivot {pivot}")]
    SingularInnovation {
        /// Failing Cholesky pivot
        pivot: usize,
    },

    /// Relative rotation too close to 180° for the small-angle residual
    #[error("attitude residual undefined (relative rotation scalar {scalar})")]
    DegenerateResidual {
        /// Scalar part of the relative quaternion
        scalar: f32,
    },

    /// Observation carries NaN/Inf or a zero-norm quaternion
    #[error("invalid pose observation: {reason}")]
    InvalidObservation {
        /// Which part of the observation is bad
        reason: &'static str,
    },

    /// Corrected state or covariance is no longer finite
    #[error("non-finite value after correction")]
    NumericalDegeneracy,
}

impl CorrectionError {
    /// True if the estimator may keep flying on the predicted state
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::NumericalDegeneracy)
    }
}

impl From<NotPositiveDefinite> for CorrectionError {
    fn from(err: NotPositiveDefinite) -> Self {
        Self::SingularInnovation { pivot: err.pivot }
    }
}

/// Estimator-level failures
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum EstimatorError {
    /// Non-finite value in state or covariance; nothing was published
    #[error("numerical degeneracy during {stage}")]
    NumericalDegeneracy {
        /// Step that produced the bad value
        stage: FilterStage,
    },

    /// Inertial sample unusable
    #[error("invalid inertial sample: {reason}")]
    InvalidSample {
        /// Which part of the sample is bad
        reason: &'static str,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for FilterStage {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Propagation => defmt::write!(fmt, "propagation"),
            Self::Correction => defmt::write!(fmt, "correction"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CorrectionError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::SingularInnovation { pivot } =>
                defmt::write!(fmt, "Innovation singular at pivot {}", pivot),
            Self::DegenerateResidual { scalar } =>
                defmt::write!(fmt, "Attitude residual undefined (w = {})", scalar),
            Self::InvalidObservation { reason } =>
                defmt::write!(fmt, "Invalid pose: {}", reason),
            Self::NumericalDegeneracy =>
                defmt::write!(fmt, "Non-finite after correction"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EstimatorError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NumericalDegeneracy { stage } =>
                defmt::write!(fmt, "Numerical degeneracy during {}", stage),
            Self::InvalidSample { reason } =>
                defmt::write!(fmt, "Invalid IMU sample: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singular_pivot_maps_to_correction_error() {
        let err: CorrectionError = NotPositiveDefinite { pivot: 4 }.into();
        assert_eq!(err, CorrectionError::SingularInnovation { pivot: 4 });
        assert!(err.is_recoverable());
        assert!(!CorrectionError::NumericalDegeneracy.is_recoverable());
    }

    #[cfg(feature = "std")]
    #[test]
    fn messages_name_the_stage() {
        let err = EstimatorError::NumericalDegeneracy { stage: FilterStage::Correction };
        assert_eq!(err.to_string(), "numerical degeneracy during correction");
    }
}
