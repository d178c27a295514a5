//! Ground-truth flight scenarios
//!
//! Each scenario is an analytic trajectory. For every tick it yields the true
//! pose and the IMU sample a perfect sensor would report, so filter output can
//! be compared against the truth it was fed.

use strapfuse_core::{
    constants::{ESTIMATOR_DT_S, GRAVITY_M_S2},
    spatial::{Quat, Vec3},
    InertialSample, PoseObservation,
};

use super::TestRng;

/// One tick of ground truth
#[derive(Debug, Clone, Copy)]
pub struct TruthSample {
    pub t: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Quat,
    pub imu: InertialSample,
}

impl TruthSample {
    /// Exact pose as the tracking system would report it
    pub fn pose(&self) -> PoseObservation {
        PoseObservation::new(self.position, self.velocity, self.orientation)
    }

    /// Pose with uniform position noise
    pub fn noisy_pose(&self, rng: &mut TestRng, position_noise: f32) -> PoseObservation {
        PoseObservation::new(self.position + rng.vec3(position_noise), self.velocity, self.orientation)
    }
}

/// Trajectory shapes
#[derive(Debug, Clone, Copy)]
pub enum Scenario {
    /// Level and motionless at a fixed point
    Hover { position: Vec3 },
    /// Level at the origin, spinning about the vertical
    YawSpin { rate: f32 },
    /// Level flight on a horizontal circle at 1 m height
    Circle { radius: f32, omega: f32 },
}

impl Scenario {
    /// Truth at time `t`
    pub fn at(&self, t: f32) -> TruthSample {
        let at_rest = Vec3::new(0.0, 0.0, GRAVITY_M_S2);
        match *self {
            Scenario::Hover { position } => TruthSample {
                t,
                position,
                velocity: Vec3::ZERO,
                orientation: Quat::IDENTITY,
                imu: InertialSample::new(at_rest, Vec3::ZERO, ESTIMATOR_DT_S),
            },
            Scenario::YawSpin { rate } => TruthSample {
                t,
                position: Vec3::ZERO,
                velocity: Vec3::ZERO,
                orientation: Quat::from_rpy(Vec3::new(0.0, 0.0, rate * t)),
                imu: InertialSample::new(at_rest, Vec3::new(0.0, 0.0, rate), ESTIMATOR_DT_S),
            },
            Scenario::Circle { radius, omega } => {
                let (s, c) = (libm::sinf(omega * t), libm::cosf(omega * t));
                let accel_world = Vec3::new(-radius * omega * omega * c, -radius * omega * omega * s, 0.0);
                TruthSample {
                    t,
                    position: Vec3::new(radius * c, radius * s, 1.0),
                    velocity: Vec3::new(-radius * omega * s, radius * omega * c, 0.0),
                    orientation: Quat::IDENTITY,
                    // level attitude: body frame equals world frame
                    imu: InertialSample::new(accel_world + at_rest, Vec3::ZERO, ESTIMATOR_DT_S),
                }
            }
        }
    }

    /// `ticks` consecutive samples starting at t = 0
    ///
    /// The IMU sample of tick `k` covers the interval ending at `t_k`, so the
    /// filter should match the truth at `t_k` after consuming it.
    pub fn run(&self, ticks: usize) -> Vec<TruthSample> {
        (1..=ticks)
            .map(|k| {
                let mut sample = self.at(k as f32 * ESTIMATOR_DT_S);
                // integrate the rate/force at the middle of the interval
                let mid = self.at((k as f32 - 0.5) * ESTIMATOR_DT_S);
                sample.imu = mid.imu;
                sample
            })
            .collect()
    }
}
