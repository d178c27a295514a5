//! Estimator State Machine
//!
//! ## Overview
//!
//! [`Estimator`] owns the filter and its two state buffers and is driven once
//! per scheduler tick with one IMU sample and, when one arrived, one external
//! pose.
//!
//! ```text
//!                 reset() / seed()
//!   ┌───────────────┐  or first pose  ┌─────────┐
//!   │ Uninitialized │ ──────────────→ │ Running │
//!   └───────────────┘                 └─────────┘
//!           ↑   await_external_pose()      │
//!           └──────────────────────────────┘
//! ```
//!
//! ## Tick
//!
//! ```text
//! propagate(front) → back, flip
//! pose?  correct(front) → back, flip, age = 0
//! else   age += dt (clamped)
//! ```
//!
//! A step that produces NaN/Inf is not flipped, so readers keep seeing the last
//! good state. A failed correction is skipped and the predicted state stays
//! published.
//!
//! ## Usage
//!
//! ```rust
//! use strapfuse_core::{Estimator, EstimatorConfig, InertialSample, InitMode, TickOutcome};
//! use strapfuse_core::spatial::Vec3;
//!
//! let config = EstimatorConfig::default().with_init_mode(InitMode::ZeroPose);
//! let mut estimator = Estimator::new(config);
//!
//! let sample = InertialSample::new(Vec3::new(0.0, 0.0, 9.81), Vec3::ZERO, 0.002);
//! assert_eq!(estimator.tick(sample, None), Ok(TickOutcome::Propagated));
//!
//! let estimate = estimator.estimate().unwrap();
//! assert!(estimate.position.norm() < 1e-6);
//! ```

use crate::{
    buffer::DoubleBuffer,
    constants::{time::STALE_POSE_AFTER_S, MAX_POSE_AGE_S, RAD_TO_DEG},
    errors::{CorrectionError, EstimatorError, EstimatorResult, FilterStage},
    fusion::{Ekf, EkfConfig, FilterState, PoseObservation},
    spatial::{Quat, Vec3},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One IMU reading
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InertialSample {
    /// Specific force in the body frame, gravity included (m/s²)
    pub accel: Vec3,
    /// Body angular rate (rad/s)
    pub gyro: Vec3,
    /// Time since the previous sample (s)
    pub dt: f32,
}

impl InertialSample {
    /// Create a sample
    pub const fn new(accel: Vec3, gyro: Vec3, dt: f32) -> Self {
        Self { accel, gyro, dt }
    }

    /// Check the sample can be integrated
    pub fn validate(&self) -> EstimatorResult<()> {
        if !self.accel.is_finite() {
            return Err(EstimatorError::InvalidSample { reason: "non-finite accelerometer" });
        }
        if !self.gyro.is_finite() {
            return Err(EstimatorError::InvalidSample { reason: "non-finite gyroscope" });
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(EstimatorError::InvalidSample { reason: "dt must be positive" });
        }
        Ok(())
    }
}

/// How the filter gets its first state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InitMode {
    /// Start at the origin, level, at rest
    ZeroPose,
    /// Wait for the first external pose and start there
    #[default]
    FirstExternalPose,
}

/// Lifecycle of the estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No state yet; ticks are ignored until a pose arrives
    Uninitialized,
    /// Filtering
    Running,
}

/// Estimator configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EstimatorConfig {
    /// Filter tuning
    pub ekf: EkfConfig,
    /// Initialization policy
    pub init_mode: InitMode,
    /// Upper bound on the reported pose age (s)
    pub max_pose_age_s: f32,
    /// Pose age above which the estimate is flagged stale (s)
    pub stale_pose_after_s: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            ekf: EkfConfig::default(),
            init_mode: InitMode::FirstExternalPose,
            max_pose_age_s: MAX_POSE_AGE_S,
            stale_pose_after_s: STALE_POSE_AFTER_S,
        }
    }
}

impl EstimatorConfig {
    /// Set the filter tuning
    pub fn with_ekf(mut self, ekf: EkfConfig) -> Self {
        self.ekf = ekf;
        self
    }

    /// Set the initialization policy
    pub fn with_init_mode(mut self, mode: InitMode) -> Self {
        self.init_mode = mode;
        self
    }

    /// Set the pose age clamp
    pub fn with_max_pose_age(mut self, seconds: f32) -> Self {
        self.max_pose_age_s = seconds;
        self
    }

    /// Set the staleness threshold
    pub fn with_stale_pose_after(mut self, seconds: f32) -> Self {
        self.stale_pose_after_s = seconds;
        self
    }
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Uninitialized and no pose to start from; nothing happened
    AwaitingInitialPose,
    /// Filter seeded from the pose of this tick, then propagated
    Initialized,
    /// Propagated; no pose this tick
    Propagated,
    /// Propagated and corrected
    Corrected,
    /// Propagated; the pose was rejected and the prediction published
    CorrectionSkipped(CorrectionError),
}

/// Roll, pitch, yaw in degrees
///
/// Pitch has the opposite sign of the quaternion's ZYX pitch, so a nose-up
/// attitude reads positive as the attitude controller expects.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attitude {
    /// Roll (deg)
    pub roll: f32,
    /// Pitch (deg), nose-up positive
    pub pitch: f32,
    /// Yaw (deg)
    pub yaw: f32,
}

impl Attitude {
    /// Convert a filter quaternion
    pub fn from_quat(q: Quat) -> Self {
        let rpy = q.to_rpy();
        Self {
            roll: rpy.x * RAD_TO_DEG,
            pitch: -rpy.y * RAD_TO_DEG,
            yaw: rpy.z * RAD_TO_DEG,
        }
    }
}

/// Published estimate in the form the controller consumes
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Estimate {
    /// Position (m)
    pub position: Vec3,
    /// Velocity (m/s)
    pub velocity: Vec3,
    /// Smoothed world acceleration, gravity removed, in units of g
    pub acceleration: Vec3,
    /// Attitude quaternion
    pub orientation: Quat,
    /// Attitude angles
    pub attitude: Attitude,
    /// Seconds since the last fused pose (clamped)
    pub pose_age_s: f32,
    /// Pose age exceeds the staleness threshold
    pub pose_stale: bool,
}

/// Runtime counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Diagnostics {
    /// Ticks with a valid sample
    pub ticks: u32,
    /// Published propagations
    pub propagations: u32,
    /// Published corrections
    pub corrections: u32,
    /// Corrections skipped for a recoverable reason
    pub skipped_corrections: u32,
    /// Steps rejected for NaN/Inf
    pub degeneracies: u32,
    /// Samples rejected before filtering
    pub rejected_samples: u32,
    /// Reason for the most recent skipped correction
    pub last_correction_error: Option<CorrectionError>,
}

/// Double-buffered estimator
#[derive(Debug, Clone)]
pub struct Estimator {
    ekf: Ekf,
    config: EstimatorConfig,
    buffers: Option<DoubleBuffer<FilterState>>,
    pose_age_s: f32,
    diagnostics: Diagnostics,
}

impl Default for Estimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

impl Estimator {
    /// Create an estimator
    ///
    /// With [`InitMode::ZeroPose`] the estimator starts [`Phase::Running`] at
    /// the origin; otherwise it waits for the first pose.
    pub fn new(config: EstimatorConfig) -> Self {
        let mut estimator = Self {
            ekf: Ekf::new(config.ekf),
            config,
            buffers: None,
            pose_age_s: config.max_pose_age_s,
            diagnostics: Diagnostics::default(),
        };
        if config.init_mode == InitMode::ZeroPose {
            estimator.reset();
        }
        estimator
    }

    /// Restart at the origin, level, at rest
    pub fn reset(&mut self) {
        let state = self.ekf.init(None);
        self.install(state);
        log_debug!("estimator reset to zero pose");
    }

    /// Restart from an explicit state
    pub fn seed(&mut self, mut state: FilterState) {
        state.orientation = state.orientation.normalize();
        self.install(state);
    }

    /// Drop the current state and re-seed from the next external pose
    pub fn await_external_pose(&mut self) {
        self.buffers = None;
        self.pose_age_s = self.config.max_pose_age_s;
    }

    fn install(&mut self, state: FilterState) {
        match self.buffers.as_mut() {
            Some(buffers) => buffers.reset(state),
            None => self.buffers = Some(DoubleBuffer::new(state)),
        }
        self.pose_age_s = self.config.max_pose_age_s;
    }

    /// Run one scheduler tick
    ///
    /// `pose` is the external pose that arrived since the previous tick, if
    /// any. It is consumed either for initialization or for correction, never
    /// both.
    pub fn tick(
        &mut self,
        sample: InertialSample,
        pose: Option<PoseObservation>,
    ) -> EstimatorResult<TickOutcome> {
        if let Err(err) = sample.validate() {
            self.diagnostics.rejected_samples = self.diagnostics.rejected_samples.wrapping_add(1);
            log_warn!("dropping IMU sample: {}", err);
            return Err(err);
        }
        self.diagnostics.ticks = self.diagnostics.ticks.wrapping_add(1);

        let mut pose = pose;
        let mut initialized = false;
        if self.buffers.is_none() {
            let Some(initial) = pose.take() else {
                return Ok(TickOutcome::AwaitingInitialPose);
            };
            if let Err(err) = initial.validate() {
                self.record_skip(err);
                return Ok(TickOutcome::CorrectionSkipped(err));
            }
            let state = self.ekf.init(Some(&initial));
            self.buffers = Some(DoubleBuffer::new(state));
            self.pose_age_s = 0.0;
            initialized = true;
            log_debug!("estimator initialized from external pose");
        }

        let Some(buffers) = self.buffers.as_mut() else {
            return Ok(TickOutcome::AwaitingInitialPose);
        };

        let propagated = {
            let (front, back) = buffers.split_mut();
            *back = self.ekf.propagate(front, sample.accel, sample.gyro, sample.dt);
            back.is_finite()
        };
        if !propagated {
            return Err(self.record_degeneracy(FilterStage::Propagation));
        }
        buffers.flip();
        self.diagnostics.propagations = self.diagnostics.propagations.wrapping_add(1);

        let Some(observation) = pose else {
            if initialized {
                return Ok(TickOutcome::Initialized);
            }
            self.advance_pose_age(sample.dt);
            return Ok(TickOutcome::Propagated);
        };

        let corrected = {
            let (front, back) = buffers.split_mut();
            self.ekf.correct(front, &observation).map(|state| *back = state)
        };
        match corrected {
            Ok(()) => {
                buffers.flip();
                self.pose_age_s = 0.0;
                self.diagnostics.corrections = self.diagnostics.corrections.wrapping_add(1);
                Ok(TickOutcome::Corrected)
            }
            Err(CorrectionError::NumericalDegeneracy) => {
                Err(self.record_degeneracy(FilterStage::Correction))
            }
            Err(err) => {
                self.record_skip(err);
                self.advance_pose_age(sample.dt);
                Ok(TickOutcome::CorrectionSkipped(err))
            }
        }
    }

    fn advance_pose_age(&mut self, dt: f32) {
        self.pose_age_s = (self.pose_age_s + dt).min(self.config.max_pose_age_s);
    }

    fn record_skip(&mut self, err: CorrectionError) {
        self.diagnostics.skipped_corrections = self.diagnostics.skipped_corrections.wrapping_add(1);
        self.diagnostics.last_correction_error = Some(err);
        log_warn!("pose correction skipped: {}", err);
    }

    fn record_degeneracy(&mut self, stage: FilterStage) -> EstimatorError {
        self.diagnostics.degeneracies = self.diagnostics.degeneracies.wrapping_add(1);
        log_error!("non-finite filter state during {}, keeping last good estimate", stage);
        EstimatorError::NumericalDegeneracy { stage }
    }

    /// Published estimate, `None` before initialization
    pub fn estimate(&self) -> Option<Estimate> {
        let state = self.state()?;
        let gravity = self.config.ekf.gravity;
        Some(Estimate {
            position: state.position,
            velocity: state.velocity,
            acceleration: state.world_acceleration * (1.0 / gravity),
            orientation: state.orientation,
            attitude: Attitude::from_quat(state.orientation),
            pose_age_s: self.pose_age_s,
            pose_stale: self.pose_age_s > self.config.stale_pose_after_s,
        })
    }

    /// Published filter state, `None` before initialization
    pub fn state(&self) -> Option<&FilterState> {
        self.buffers.as_ref().map(DoubleBuffer::front)
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        if self.buffers.is_some() {
            Phase::Running
        } else {
            Phase::Uninitialized
        }
    }

    /// Seconds since the last fused pose (clamped)
    pub fn pose_age_s(&self) -> f32 {
        self.pose_age_s
    }

    /// Runtime counters
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Configuration in use
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Change the filter tuning without touching the state
    pub fn set_ekf_config(&mut self, ekf: EkfConfig) {
        self.config.ekf = ekf;
        self.ekf.set_config(ekf);
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TickOutcome {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::AwaitingInitialPose => defmt::write!(fmt, "awaiting pose"),
            Self::Initialized => defmt::write!(fmt, "initialized"),
            Self::Propagated => defmt::write!(fmt, "propagated"),
            Self::Corrected => defmt::write!(fmt, "corrected"),
            Self::CorrectionSkipped(err) => defmt::write!(fmt, "skipped: {}", err),
        }
    }
}
