//! Motion-Capture Fusion Example
//!
//! Flies a simulated quadrotor on a 1 m circle and feeds the estimator the
//! way the firmware does: a 500 Hz IMU tick, a 100 Hz motion-capture stream,
//! and a half-second dropout in the middle.
//!
//! ## What You'll Learn
//!
//! - Wiring [`ExternalPoseTracker`] between the radio and the estimator
//! - Reading the published estimate and its staleness flag
//! - What the diagnostics counters report
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 01_mocap_circle
//! ```

use strapfuse_core::{
    constants::{ESTIMATOR_DT_S, GRAVITY_M_S2},
    pose::ExternalPoseTracker,
    spatial::{Quat, Vec3},
    time::FixedTime,
    Estimator, EstimatorConfig, InertialSample,
};

const RADIUS: f32 = 1.0;
const OMEGA: f32 = 1.5;

fn truth(t: f32) -> (Vec3, Vec3) {
    let (s, c) = (t * OMEGA).sin_cos();
    let position = Vec3::new(RADIUS * c, RADIUS * s, 1.0);
    let accel = Vec3::new(-RADIUS * OMEGA * OMEGA * c, -RADIUS * OMEGA * OMEGA * s, 0.0);
    (position, accel)
}

fn main() {
    println!("Strapfuse Motion-Capture Fusion Example");
    println!("=======================================\n");

    let mut clock = FixedTime::new(0);
    let mut tracker = ExternalPoseTracker::new();
    let mut estimator = Estimator::new(EstimatorConfig::default());

    for k in 1..=2500u32 {
        clock.advance(2);
        let t = k as f32 * ESTIMATOR_DT_S;
        let (position, accel) = truth(t);

        // motion capture at 100 Hz, silent between 2.0 s and 2.5 s
        let dropout = (2.0..2.5).contains(&t);
        if k % 5 == 0 && !dropout {
            if let Err(e) = tracker.receive(position, Quat::IDENTITY, &clock) {
                println!("rejected pose: {}", e);
            }
        }

        let sample = InertialSample::new(accel + Vec3::new(0.0, 0.0, GRAVITY_M_S2), Vec3::ZERO, ESTIMATOR_DT_S);
        if let Err(e) = estimator.tick(sample, tracker.take_fresh()) {
            println!("t = {:.3} s: {}", t, e);
        }

        if k % 250 == 0 {
            if let Some(est) = estimator.estimate() {
                let err = (est.position - position).norm();
                println!(
                    "t = {:4.2} s  pos = ({:6.3}, {:6.3}, {:6.3})  err = {:.4} m  age = {:.3} s{}",
                    t,
                    est.position.x,
                    est.position.y,
                    est.position.z,
                    err,
                    est.pose_age_s,
                    if est.pose_stale { "  STALE" } else { "" },
                );
            }
        }
    }

    let diag = estimator.diagnostics();
    println!("\nDiagnostics");
    println!("-----------");
    println!("ticks:                {}", diag.ticks);
    println!("corrections:          {}", diag.corrections);
    println!("skipped corrections:  {}", diag.skipped_corrections);
    println!("degeneracies:         {}", diag.degeneracies);
}
