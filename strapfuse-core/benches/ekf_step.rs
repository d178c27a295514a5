//! Timing of one filter tick
//!
//! The attitude task has a 2 ms budget at 500 Hz. On the host these numbers
//! are only relative; they catch regressions in the matrix code.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use strapfuse_core::{
    constants::{ESTIMATOR_DT_S, GRAVITY_M_S2},
    fusion::matrix::{gemm, invert_spd, zeros, Op, SquareMatrix},
    spatial::{Quat, Vec3},
    Ekf, Estimator, EstimatorConfig, InertialSample, InitMode, PoseObservation,
};

fn flying_state(ekf: &Ekf) -> strapfuse_core::FilterState {
    let mut state = ekf.init(None);
    for i in 0..100 {
        let t = i as f32 * ESTIMATOR_DT_S;
        state = ekf.propagate(
            &state,
            Vec3::new(0.3, -0.2, GRAVITY_M_S2 + t),
            Vec3::new(0.1, 0.4, -0.2),
            ESTIMATOR_DT_S,
        );
    }
    state
}

fn bench_steps(c: &mut Criterion) {
    let ekf = Ekf::default();
    let state = flying_state(&ekf);
    let accel = Vec3::new(0.3, -0.2, GRAVITY_M_S2);
    let gyro = Vec3::new(0.1, 0.4, -0.2);
    let pose = PoseObservation::new(
        state.position + Vec3::new(0.01, 0.0, -0.01),
        state.velocity,
        state.orientation * Quat::from_small_angle(Vec3::new(0.01, 0.0, 0.02)),
    );

    c.bench_function("propagate", |b| {
        b.iter(|| ekf.propagate(black_box(&state), black_box(accel), black_box(gyro), ESTIMATOR_DT_S))
    });

    c.bench_function("correct", |b| {
        b.iter(|| ekf.correct(black_box(&state), black_box(&pose)))
    });

    let mut estimator = Estimator::new(EstimatorConfig::default().with_init_mode(InitMode::ZeroPose));
    let sample = InertialSample::new(Vec3::new(0.0, 0.0, GRAVITY_M_S2), Vec3::ZERO, ESTIMATOR_DT_S);
    let origin = PoseObservation::new(Vec3::ZERO, Vec3::ZERO, Quat::IDENTITY);
    c.bench_function("tick_with_pose", |b| {
        b.iter(|| estimator.tick(black_box(sample), Some(origin)))
    });
}

fn bench_matrix(c: &mut Criterion) {
    let ekf = Ekf::default();
    let p = flying_state(&ekf).covariance;

    c.bench_function("gemm_9x9", |b| {
        let mut out: SquareMatrix<9> = zeros();
        b.iter(|| gemm(Op::NoTrans, black_box(&p), Op::Trans, black_box(&p), 1.0, 0.0, &mut out))
    });

    c.bench_function("invert_spd_9x9", |b| {
        let mut inv: SquareMatrix<9> = zeros();
        b.iter(|| invert_spd(black_box(&p), &mut inv))
    });
}

criterion_group!(benches, bench_steps, bench_matrix);
criterion_main!(benches);
