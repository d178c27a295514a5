//! Linearized Error Dynamics
//!
//! The covariance step needs two matrices per IMU sample:
//!
//! - `F`, the discrete transition of the error state over `dt`
//! - `dt·G·Qd·Gᵀ`, the process noise injected by the gyro and accelerometer
//!
//! ## Jacobian Structure
//!
//! ```text
//!        pos     vel      att
//! pos  [  I     dt·I    C[a]×·A ]
//! vel  [  0      I      C[a]×·B ]
//! att  [  0      0         E    ]
//!
//! A = dt³/6·[ω]× − dt²/2·I
//! B = dt²/2·[ω]× − dt·I
//! E = I − dt·[ω]×
//! ```
//!
//! `A`, `B` and `E` are the leading terms of the Taylor series of
//! `exp(−dt·[ω]×)` and its integrals. At 500 Hz the dropped terms are far below
//! single-precision resolution, so no matrix exponential is evaluated.
//!
//! `a` is the raw specific force (gravity not removed).

use crate::{
    fusion::{
        matrix::{diagonal, gemm, identity, set_block33, zeros, Matrix, Op, SquareMatrix},
        EKF_DISTURBANCE, EKF_N,
    },
    spatial::{Mat33, Quat, Vec3},
};

/// Maps gyro and accelerometer noise into the error-state derivative
pub type NoiseInputMatrix = Matrix<EKF_N, EKF_DISTURBANCE>;

/// Discrete error-state transition matrix `F`
///
/// `orientation` is the attitude *after* integrating this sample.
pub fn dynamics_jacobian(
    orientation: Quat,
    omega: Vec3,
    specific_force: Vec3,
    dt: f32,
) -> SquareMatrix<EKF_N> {
    let dt_p2_2 = dt * dt * 0.5;
    let dt_p3_6 = dt_p2_2 * dt / 3.0;

    let c = orientation.to_rotation_matrix();
    let w_sk = Mat33::skew(omega);
    let ca = c.mul_mat(&Mat33::skew(specific_force));

    let pos_by_att = Mat33::scaled_plus_identity(dt_p3_6, &w_sk, -dt_p2_2);
    let vel_by_att = Mat33::scaled_plus_identity(dt_p2_2, &w_sk, -dt);
    let att_by_att = Mat33::scaled_plus_identity(-dt, &w_sk, 1.0);

    let mut f = identity::<EKF_N>();
    set_block33(&mut f, 0, 3, &Mat33::diagonal(dt));
    set_block33(&mut f, 0, 6, &ca.mul_mat(&pos_by_att));
    set_block33(&mut f, 3, 6, &ca.mul_mat(&vel_by_att));
    set_block33(&mut f, 6, 6, &att_by_att);
    f
}

/// Noise input matrix `G`
///
/// Gyro noise drives the attitude error directly; accelerometer noise drives
/// the velocity error through the attitude.
pub fn noise_input_matrix(orientation: Quat) -> NoiseInputMatrix {
    let mut g: NoiseInputMatrix = zeros();
    set_block33(&mut g, 6, 0, &Mat33::diagonal(-1.0));
    set_block33(&mut g, 3, 3, &orientation.inverse().to_rotation_matrix().negated());
    g
}

/// Add `dt·G·Qd·Gᵀ` to `p` in place
pub fn add_process_noise(
    p: &mut SquareMatrix<EKF_N>,
    orientation: Quat,
    dt: f32,
    gyro_variance: f32,
    accel_variance: f32,
) {
    let qd = diagonal(&[
        gyro_variance,
        gyro_variance,
        gyro_variance,
        accel_variance,
        accel_variance,
        accel_variance,
    ]);
    let g = noise_input_matrix(orientation);

    let mut qgt: Matrix<EKF_DISTURBANCE, EKF_N> = zeros();
    gemm(Op::NoTrans, &qd, Op::Trans, &g, 1.0, 0.0, &mut qgt);
    gemm(Op::NoTrans, &g, Op::NoTrans, &qgt, dt, 1.0, p);
}

/// Process-noise contribution `dt·G·Qd·Gᵀ` on its own
pub fn process_noise(
    orientation: Quat,
    dt: f32,
    gyro_variance: f32,
    accel_variance: f32,
) -> SquareMatrix<EKF_N> {
    let mut q = zeros();
    add_process_noise(&mut q, orientation, dt, gyro_variance, accel_variance);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GRAVITY_M_S2;

    #[test]
    fn jacobian_at_rest() {
        let dt = 0.002;
        let f = dynamics_jacobian(
            Quat::IDENTITY,
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, GRAVITY_M_S2),
            dt,
        );

        // position integrates velocity
        assert_eq!(f[0][3], dt);
        assert_eq!(f[2][5], dt);
        // attitude error is constant without rotation
        for i in 6..9 {
            assert_eq!(f[i][i], 1.0);
        }
        // tilt error leaks gravity into horizontal velocity
        assert!((f[3][7] - GRAVITY_M_S2 * dt).abs() < 1e-6);
        assert!((f[4][6] + GRAVITY_M_S2 * dt).abs() < 1e-6);
        assert_eq!(f[5][6], 0.0);
        // and, one order smaller, into position
        assert!((f[0][7] - GRAVITY_M_S2 * dt * dt * 0.5).abs() < 1e-8);
    }

    #[test]
    fn jacobian_rotation_block() {
        let dt = 0.01;
        let f = dynamics_jacobian(Quat::IDENTITY, Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, dt);

        // E = I - dt·[ω]×
        assert!((f[6][7] - 2.0 * dt).abs() < 1e-7);
        assert!((f[7][6] + 2.0 * dt).abs() < 1e-7);
        // no specific force, no coupling into translation
        assert_eq!(f[3][6], 0.0);
        assert_eq!(f[0][8], 0.0);
    }

    #[test]
    fn zero_step_is_identity() {
        let f = dynamics_jacobian(
            Quat::from_rpy(Vec3::new(0.1, 0.2, 0.3)),
            Vec3::new(1.0, -1.0, 0.5),
            Vec3::new(0.3, 0.1, 9.8),
            0.0,
        );
        assert_eq!(f, identity());
    }

    #[test]
    fn process_noise_blocks() {
        let dt = 0.002;
        let q = process_noise(Quat::from_rpy(Vec3::new(0.3, -0.2, 1.0)), dt, 2e-5, 2.4e-3);

        for i in 0..3 {
            // position receives no direct noise
            assert_eq!(q[i][i], 0.0);
            // velocity: rotation of an isotropic variance stays isotropic
            assert!((q[3 + i][3 + i] - dt * 2.4e-3).abs() < 1e-9);
            assert!((q[6 + i][6 + i] - dt * 2e-5).abs() < 1e-12);
        }
        for i in 0..9 {
            for j in 0..9 {
                assert!((q[i][j] - q[j][i]).abs() < 1e-10);
            }
        }
    }
}
