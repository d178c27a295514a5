//! Error-State Extended Kalman Filter
//!
//! ## Overview
//!
//! [`Ekf`] holds only configuration. Both steps are pure functions from the
//! previous [`FilterState`] (plus a measurement) to a new one, so the caller
//! decides where states live and when a new one becomes visible.
//!
//! ### Propagation
//! ```text
//! q⁺  = normalize(q + dt/2·Ω(ω)·q)
//! aʷ  = q⁺ ⊗ a ⊗ q⁺* − (0, 0, g)
//! v⁺  = v + dt·aʷ
//! p⁺  = p + dt·v⁺                (semi-implicit Euler)
//!     = p + dt·(v + v⁺)/2        (trapezoidal)
//! P⁺  = F·P·Fᵀ + dt·G·Qd·Gᵀ
//! ```
//!
//! ### Correction
//!
//! The motion-capture system observes the full pose, so `H = I` and the
//! innovation is the residual itself:
//! ```text
//! y   = [p_obs − p, v_obs − v, 2·vec(q_r)/w(q_r)],  q_r = q* ⊗ q_obs
//! S   = P + R
//! K   = P·S⁻¹
//! Δ   = K·y
//! P⁺  = (I − K)·P·(I − K)ᵀ + K·R·Kᵀ
//! ```
//! The attitude part of `Δ` is a small rotation applied on the right of the
//! nominal quaternion.
//!
//! ## Usage
//!
//! ```rust
//! use strapfuse_core::fusion::{Ekf, EkfConfig, PoseObservation};
//! use strapfuse_core::spatial::{Quat, Vec3};
//!
//! let ekf = Ekf::new(EkfConfig::default());
//! let state = ekf.init(None);
//!
//! // one IMU sample at rest
//! let state = ekf.propagate(&state, Vec3::new(0.0, 0.0, 9.81), Vec3::ZERO, 0.002);
//!
//! // one motion-capture pose
//! let pose = PoseObservation::new(Vec3::new(0.01, 0.0, 0.0), Vec3::ZERO, Quat::IDENTITY);
//! let state = ekf.correct(&state, &pose).unwrap();
//! assert!(state.position.x > 0.0);
//! ```

use libm::fabsf;

use crate::{
    constants::{
        fusion::{ACCEL_SMOOTHING_ALPHA, INITIAL_COVARIANCE, MIN_RESIDUAL_SCALAR},
        ACCEL_VARIANCE, GRAVITY_M_S2, GYRO_VARIANCE, POSE_ATTITUDE_VARIANCE,
        POSE_POSITION_VARIANCE, POSE_VELOCITY_VARIANCE,
    },
    errors::{CorrectionError, CorrectionResult},
    fusion::{
        dynamics::{add_process_noise, dynamics_jacobian},
        matrix::{
            all_finite, gemm, identity, invert_spd, make_symmetric, matvec, trace, zeros,
            Op, SquareMatrix, Vector,
        },
        EKF_M, EKF_N,
    },
    spatial::{Quat, Vec3},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scheme used to integrate velocity into position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Integration {
    /// `p⁺ = p + dt·v⁺`
    #[default]
    SemiImplicitEuler,
    /// `p⁺ = p + dt·(v + v⁺)/2`
    Trapezoidal,
}

/// Filter tuning
///
/// Variances are in squared SI units. Defaults are the measured values from
/// [`crate::constants::fusion`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EkfConfig {
    /// External position variance (m²)
    pub position_variance: f32,
    /// External velocity variance ((m/s)²)
    pub velocity_variance: f32,
    /// External attitude variance (rad²)
    pub attitude_variance: f32,
    /// Gyroscope noise variance ((rad/s)²)
    pub gyro_variance: f32,
    /// Accelerometer noise variance ((m/s²)²)
    pub accel_variance: f32,
    /// Covariance diagonal at initialization
    pub initial_covariance: f32,
    /// Gravity magnitude removed from the rotated specific force (m/s²)
    pub gravity: f32,
    /// Weight of the newest sample in [`FilterState::world_acceleration`]
    pub accel_alpha: f32,
    /// Velocity to position integration
    pub integration: Integration,
    /// Average `P` with `Pᵀ` after every step
    pub enforce_symmetry: bool,
}

impl Default for EkfConfig {
    fn default() -> Self {
        Self {
            position_variance: POSE_POSITION_VARIANCE,
            velocity_variance: POSE_VELOCITY_VARIANCE,
            attitude_variance: POSE_ATTITUDE_VARIANCE,
            gyro_variance: GYRO_VARIANCE,
            accel_variance: ACCEL_VARIANCE,
            initial_covariance: INITIAL_COVARIANCE,
            gravity: GRAVITY_M_S2,
            accel_alpha: ACCEL_SMOOTHING_ALPHA,
            integration: Integration::SemiImplicitEuler,
            enforce_symmetry: true,
        }
    }
}

impl EkfConfig {
    /// Set the pose measurement variances (position, velocity, attitude)
    pub fn with_measurement_noise(mut self, position: f32, velocity: f32, attitude: f32) -> Self {
        self.position_variance = position;
        self.velocity_variance = velocity;
        self.attitude_variance = attitude;
        self
    }

    /// Set the inertial process-noise variances
    pub fn with_process_noise(mut self, gyro: f32, accel: f32) -> Self {
        self.gyro_variance = gyro;
        self.accel_variance = accel;
        self
    }

    /// Set the initial covariance diagonal
    pub fn with_initial_covariance(mut self, variance: f32) -> Self {
        self.initial_covariance = variance;
        self
    }

    /// Set the gravity magnitude
    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the world-acceleration smoothing weight (clamped to `[0, 1]`)
    pub fn with_accel_alpha(mut self, alpha: f32) -> Self {
        self.accel_alpha = alpha.clamp(0.0, 1.0);
        self
    }

    /// Select the position integration scheme
    pub fn with_integration(mut self, integration: Integration) -> Self {
        self.integration = integration;
        self
    }

    /// Enable or disable covariance symmetrization
    pub fn with_enforce_symmetry(mut self, enforce: bool) -> Self {
        self.enforce_symmetry = enforce;
        self
    }

    /// Diagonal of the measurement noise `R`
    pub fn measurement_variances(&self) -> Vector<EKF_M> {
        let (p, v, a) = (self.position_variance, self.velocity_variance, self.attitude_variance);
        [p, p, p, v, v, v, a, a, a]
    }
}

/// Nominal state plus error covariance
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FilterState {
    /// Position in the world frame (m)
    pub position: Vec3,
    /// Velocity in the world frame (m/s)
    pub velocity: Vec3,
    /// Attitude, rotates body vectors into the world frame
    pub orientation: Quat,
    /// Smoothed world acceleration with gravity removed (m/s²)
    ///
    /// Reported to consumers only; not part of the error state.
    pub world_acceleration: Vec3,
    /// Covariance of `[δp, δv, δθ]`
    pub covariance: SquareMatrix<EKF_N>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::at_pose(Vec3::ZERO, Vec3::ZERO, Quat::IDENTITY, INITIAL_COVARIANCE)
    }
}

impl FilterState {
    /// State at a given pose with an isotropic diagonal covariance
    pub fn at_pose(position: Vec3, velocity: Vec3, orientation: Quat, variance: f32) -> Self {
        let mut covariance: SquareMatrix<EKF_N> = zeros();
        for (i, row) in covariance.iter_mut().enumerate() {
            row[i] = variance;
        }
        Self {
            position,
            velocity,
            orientation,
            world_acceleration: Vec3::ZERO,
            covariance,
        }
    }

    /// True if no component of the state or covariance is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.orientation.is_finite()
            && self.world_acceleration.is_finite()
            && all_finite(&self.covariance)
    }

    /// Total variance of the error state
    pub fn uncertainty(&self) -> f32 {
        trace(&self.covariance)
    }
}

/// Full pose from the external tracking system, world frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoseObservation {
    /// Position (m)
    pub position: Vec3,
    /// Velocity (m/s)
    pub velocity: Vec3,
    /// Attitude, same convention as [`FilterState::orientation`]
    pub orientation: Quat,
}

impl PoseObservation {
    /// Create an observation
    pub const fn new(position: Vec3, velocity: Vec3, orientation: Quat) -> Self {
        Self { position, velocity, orientation }
    }

    pub(crate) fn validate(&self) -> CorrectionResult<Quat> {
        if !self.position.is_finite() {
            return Err(CorrectionError::InvalidObservation { reason: "non-finite position" });
        }
        if !self.velocity.is_finite() {
            return Err(CorrectionError::InvalidObservation { reason: "non-finite velocity" });
        }
        if !self.orientation.is_finite() {
            return Err(CorrectionError::InvalidObservation { reason: "non-finite orientation" });
        }
        if self.orientation.norm() <= f32::EPSILON {
            return Err(CorrectionError::InvalidObservation { reason: "zero quaternion" });
        }
        Ok(self.orientation.normalize())
    }
}

/// Corrected state together with the quantities that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// State after the correction
    pub state: FilterState,
    /// Innovation `y`
    pub residual: Vector<EKF_M>,
    /// Error-state update `Δ = K·y`
    pub delta: Vector<EKF_N>,
}

/// Error-state EKF for IMU + external pose
#[derive(Debug, Clone, Default)]
pub struct Ekf {
    config: EkfConfig,
}

impl Ekf {
    /// Create a filter with the given tuning
    pub fn new(config: EkfConfig) -> Self {
        Self { config }
    }

    /// Current tuning
    pub fn config(&self) -> &EkfConfig {
        &self.config
    }

    /// Replace the tuning; takes effect on the next step
    pub fn set_config(&mut self, config: EkfConfig) {
        self.config = config;
    }

    /// Initial state
    ///
    /// With a pose hint the nominal state starts at that pose, otherwise at
    /// the origin, level and at rest. Covariance is
    /// [`EkfConfig::initial_covariance`] on the diagonal.
    pub fn init(&self, pose_hint: Option<&PoseObservation>) -> FilterState {
        match pose_hint {
            Some(pose) => FilterState::at_pose(
                pose.position,
                pose.velocity,
                pose.orientation.normalize(),
                self.config.initial_covariance,
            ),
            None => FilterState::at_pose(
                Vec3::ZERO,
                Vec3::ZERO,
                Quat::IDENTITY,
                self.config.initial_covariance,
            ),
        }
    }

    /// Integrate one IMU sample
    ///
    /// `accel` is the raw specific force in the body frame (gravity included),
    /// `gyro` the body rate in rad/s. The result is not checked for finiteness.
    pub fn propagate(&self, prev: &FilterState, accel: Vec3, gyro: Vec3, dt: f32) -> FilterState {
        let cfg = &self.config;
        let mut next = *prev;

        next.orientation = prev.orientation.gyro_update(gyro, dt).normalize();

        let accel_world = next.orientation.rotate(accel) - Vec3::new(0.0, 0.0, cfg.gravity);

        next.velocity = prev.velocity + accel_world * dt;
        next.position = match cfg.integration {
            Integration::SemiImplicitEuler => prev.position + next.velocity * dt,
            Integration::Trapezoidal => {
                prev.position + (prev.velocity + next.velocity) * (0.5 * dt)
            }
        };

        next.world_acceleration =
            prev.world_acceleration * (1.0 - cfg.accel_alpha) + accel_world * cfg.accel_alpha;

        // P = F·P·Fᵀ + dt·G·Qd·Gᵀ
        let f = dynamics_jacobian(next.orientation, gyro, accel, dt);
        let mut fp: SquareMatrix<EKF_N> = zeros();
        gemm(Op::NoTrans, &f, Op::NoTrans, &prev.covariance, 1.0, 0.0, &mut fp);
        gemm(Op::NoTrans, &fp, Op::Trans, &f, 1.0, 0.0, &mut next.covariance);
        add_process_noise(
            &mut next.covariance,
            next.orientation,
            dt,
            cfg.gyro_variance,
            cfg.accel_variance,
        );

        if cfg.enforce_symmetry {
            make_symmetric(&mut next.covariance);
        }

        next
    }

    /// Fuse one external pose
    pub fn correct(&self, prev: &FilterState, pose: &PoseObservation) -> CorrectionResult<FilterState> {
        self.correct_detailed(prev, pose).map(|c| c.state)
    }

    /// Fuse one external pose and return the innovation and update as well
    pub fn correct_detailed(
        &self,
        prev: &FilterState,
        pose: &PoseObservation,
    ) -> CorrectionResult<Correction> {
        let observed_q = pose.validate()?;
        let residual = attitude_residual(prev, pose, observed_q)?;

        let r = self.config.measurement_variances();

        // S = P + R, H = I
        let mut s = prev.covariance;
        for (i, row) in s.iter_mut().enumerate() {
            row[i] += r[i];
        }

        let mut s_inv: SquareMatrix<EKF_M> = zeros();
        invert_spd(&s, &mut s_inv)?;

        // K = P·S⁻¹
        let mut k: SquareMatrix<EKF_N> = zeros();
        gemm(Op::NoTrans, &prev.covariance, Op::NoTrans, &s_inv, 1.0, 0.0, &mut k);

        let mut delta = [0.0; EKF_N];
        matvec(&k, &residual, &mut delta);

        let mut next = *prev;
        next.position = prev.position + Vec3::from_slice(&delta[0..3]);
        next.velocity = prev.velocity + Vec3::from_slice(&delta[3..6]);
        next.orientation =
            (prev.orientation * Quat::from_small_angle(Vec3::from_slice(&delta[6..9]))).normalize();
        next.covariance = joseph_update(&prev.covariance, &k, &r);

        if self.config.enforce_symmetry {
            make_symmetric(&mut next.covariance);
        }

        if !next.is_finite() {
            return Err(CorrectionError::NumericalDegeneracy);
        }

        Ok(Correction { state: next, residual, delta })
    }
}

/// Innovation with the small-angle attitude residual
fn attitude_residual(
    prev: &FilterState,
    pose: &PoseObservation,
    observed_q: Quat,
) -> CorrectionResult<Vector<EKF_M>> {
    let q_r = prev.orientation.conjugate() * observed_q;
    if fabsf(q_r.w) < MIN_RESIDUAL_SCALAR || !q_r.is_finite() {
        return Err(CorrectionError::DegenerateResidual { scalar: q_r.w });
    }

    let dp = pose.position - prev.position;
    let dv = pose.velocity - prev.velocity;
    let dq = q_r.imag() * (2.0 / q_r.w);

    let mut y = [0.0; EKF_M];
    dp.store(&mut y[0..3]);
    dv.store(&mut y[3..6]);
    dq.store(&mut y[6..9]);
    Ok(y)
}

/// `(I − K)·P·(I − K)ᵀ + K·R·Kᵀ` for diagonal `R`
fn joseph_update(
    p: &SquareMatrix<EKF_N>,
    k: &SquareMatrix<EKF_N>,
    r: &Vector<EKF_M>,
) -> SquareMatrix<EKF_N> {
    let mut i_k = identity::<EKF_N>();
    for i in 0..EKF_N {
        for j in 0..EKF_N {
            i_k[i][j] -= k[i][j];
        }
    }

    let mut tmp: SquareMatrix<EKF_N> = zeros();
    gemm(Op::NoTrans, &i_k, Op::NoTrans, p, 1.0, 0.0, &mut tmp);
    let mut out: SquareMatrix<EKF_N> = zeros();
    gemm(Op::NoTrans, &tmp, Op::Trans, &i_k, 1.0, 0.0, &mut out);

    // K·R scales the columns of K
    let mut kr = *k;
    for row in kr.iter_mut() {
        for (v, var) in row.iter_mut().zip(r.iter()) {
            *v *= var;
        }
    }
    gemm(Op::NoTrans, &kr, Op::Trans, k, 1.0, 1.0, &mut out);
    out
}
