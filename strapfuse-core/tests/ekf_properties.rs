//! Property tests for the filter invariants
//!
//! Random IMU streams and pose observations must never break:
//! - unit-norm attitude
//! - symmetric, finite covariance
//! - non-increasing uncertainty through a correction
//! - bit-for-bit determinism

use proptest::prelude::*;

use strapfuse_core::{
    constants::GRAVITY_M_S2,
    fusion::matrix::{trace, SquareMatrix},
    spatial::{Quat, Vec3},
    Ekf, EkfConfig, Estimator, EstimatorConfig, FilterState, InertialSample, InitMode,
    Integration, PoseObservation, TickOutcome,
};

const N: usize = 9;

fn vec3(range: f32) -> impl Strategy<Value = Vec3> {
    prop::array::uniform3(-range..range).prop_map(|[x, y, z]| Vec3::new(x, y, z))
}

fn imu_step() -> impl Strategy<Value = (Vec3, Vec3, f32)> {
    (
        vec3(20.0).prop_map(|a| a + Vec3::new(0.0, 0.0, GRAVITY_M_S2)),
        vec3(10.0),
        0.0005f32..0.01,
    )
}

/// Moderate manoeuvres, keeps the covariance well conditioned in f32
fn gentle_imu_step() -> impl Strategy<Value = (Vec3, Vec3, f32)> {
    (
        vec3(5.0).prop_map(|a| a + Vec3::new(0.0, 0.0, GRAVITY_M_S2)),
        vec3(3.0),
        0.001f32..0.005,
    )
}

fn attitude() -> impl Strategy<Value = Quat> {
    vec3(core::f32::consts::PI).prop_map(Quat::from_rpy)
}

fn integration() -> impl Strategy<Value = Integration> {
    prop_oneof![Just(Integration::SemiImplicitEuler), Just(Integration::Trapezoidal)]
}

fn assert_symmetric(p: &SquareMatrix<N>) -> Result<(), TestCaseError> {
    for i in 0..N {
        for j in 0..N {
            prop_assert!(
                (p[i][j] - p[j][i]).abs() <= 1e-4 * (1.0 + p[i][j].abs()),
                "P[{}][{}] = {} vs {}",
                i,
                j,
                p[i][j],
                p[j][i]
            );
        }
    }
    Ok(())
}

/// Filter state after a short random flight
fn flown(ekf: &Ekf, start: Quat, steps: &[(Vec3, Vec3, f32)]) -> FilterState {
    let mut state = FilterState::at_pose(Vec3::ZERO, Vec3::ZERO, start, 1.0);
    for &(accel, gyro, dt) in steps {
        state = ekf.propagate(&state, accel, gyro, dt);
    }
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn propagation_preserves_invariants(
        start in attitude(),
        steps in prop::collection::vec(imu_step(), 1..200),
        scheme in integration(),
    ) {
        let ekf = Ekf::new(EkfConfig::default().with_integration(scheme));
        let mut state = FilterState::at_pose(Vec3::ZERO, Vec3::ZERO, start, 1.0);

        for &(accel, gyro, dt) in &steps {
            state = ekf.propagate(&state, accel, gyro, dt);
            prop_assert!((state.orientation.norm() - 1.0).abs() < 1e-5);
        }

        prop_assert!(state.is_finite());
        assert_symmetric(&state.covariance)?;
        for i in 0..N {
            prop_assert!(state.covariance[i][i] > 0.0);
        }
    }

    #[test]
    fn correction_never_adds_uncertainty(
        start in attitude(),
        steps in prop::collection::vec(gentle_imu_step(), 1..30),
        offset in vec3(0.5),
        velocity_offset in vec3(1.0),
        tilt in vec3(0.4),
    ) {
        let ekf = Ekf::default();
        let state = flown(&ekf, start, &steps);

        let pose = PoseObservation::new(
            state.position + offset,
            state.velocity + velocity_offset,
            state.orientation * Quat::from_small_angle(tilt),
        );
        let corrected = ekf.correct_detailed(&state, &pose).unwrap();

        prop_assert!((corrected.state.orientation.norm() - 1.0).abs() < 1e-5);
        prop_assert!(corrected.state.is_finite());
        assert_symmetric(&corrected.state.covariance)?;

        let before = trace(&state.covariance);
        let after = trace(&corrected.state.covariance);
        prop_assert!(after <= before * (1.0 + 1e-5), "trace grew from {} to {}", before, after);

        // moves towards the observation
        let before_err = (pose.position - state.position).norm();
        let after_err = (pose.position - corrected.state.position).norm();
        prop_assert!(after_err <= before_err + 1e-6);
    }

    #[test]
    fn repeated_perfect_pose_converges(
        start in attitude(),
        steps in prop::collection::vec(gentle_imu_step(), 1..30),
    ) {
        let ekf = Ekf::default();
        let mut state = flown(&ekf, start, &steps);
        let pose = PoseObservation::new(state.position, state.velocity, state.orientation);

        let mut last_trace = trace(&state.covariance);
        for _ in 0..5 {
            let corrected = ekf.correct_detailed(&state, &pose).unwrap();
            for d in corrected.delta.iter() {
                prop_assert!(d.abs() < 1e-4, "delta {:?}", corrected.delta);
            }
            let t = trace(&corrected.state.covariance);
            prop_assert!(t <= last_trace * (1.0 + 1e-5));
            last_trace = t;
            state = corrected.state;
        }
    }

    #[test]
    fn estimator_is_deterministic(
        steps in prop::collection::vec(imu_step(), 1..300),
        pose_every in 2usize..20,
        jitter in vec3(0.05),
    ) {
        let config = EstimatorConfig::default().with_init_mode(InitMode::ZeroPose);
        let mut a = Estimator::new(config);
        let mut b = Estimator::new(config);

        for (k, &(accel, gyro, dt)) in steps.iter().enumerate() {
            let sample = InertialSample::new(accel, gyro, dt);
            let pose = (k % pose_every == 0).then(|| {
                PoseObservation::new(jitter * (k as f32 * 0.01), Vec3::ZERO, Quat::IDENTITY)
            });
            let ra = a.tick(sample, pose);
            let rb = b.tick(sample, pose);
            prop_assert_eq!(ra, rb);
        }

        prop_assert_eq!(a.state(), b.state());
        prop_assert_eq!(a.diagnostics(), b.diagnostics());
    }

    #[test]
    fn published_state_is_always_finite(
        steps in prop::collection::vec(imu_step(), 1..300),
        pose_every in 2usize..20,
    ) {
        let mut estimator = Estimator::new(
            EstimatorConfig::default().with_init_mode(InitMode::ZeroPose),
        );

        for (k, &(accel, gyro, dt)) in steps.iter().enumerate() {
            let pose = (k % pose_every == 0)
                .then(|| PoseObservation::new(Vec3::ZERO, Vec3::ZERO, Quat::IDENTITY));
            match estimator.tick(InertialSample::new(accel, gyro, dt), pose) {
                Ok(TickOutcome::AwaitingInitialPose) | Ok(TickOutcome::Initialized) => {
                    prop_assert!(false, "zero-pose estimator starts running");
                }
                _ => {}
            }
            let state = estimator.state().unwrap();
            prop_assert!(state.is_finite());
            prop_assert!((state.orientation.norm() - 1.0).abs() < 1e-5);
        }
    }
}
