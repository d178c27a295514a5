//! External Pose Tracking
//!
//! ## Overview
//!
//! The motion-capture link delivers position and attitude only, at roughly
//! 100 Hz and with jitter. [`ExternalPoseTracker`] turns that stream into
//! [`PoseObservation`]s for the filter:
//!
//! 1. **Velocity** by differencing successive positions. The interval has a
//!    5 ms floor so two packets from the same radio burst cannot produce a
//!    velocity spike. The first pose has zero velocity.
//! 2. **Freshness**: a pose is handed to the estimator at most once through
//!    [`ExternalPoseTracker::take_fresh`].
//! 3. **Age** since the last pose, clamped to 10 s.
//!
//! ## Usage Example
//!
//! ```rust
//! use strapfuse_core::pose::ExternalPoseTracker;
//! use strapfuse_core::spatial::{Quat, Vec3};
//! use strapfuse_core::time::FixedTime;
//!
//! let mut clock = FixedTime::new(1000);
//! let mut tracker = ExternalPoseTracker::new();
//!
//! tracker.receive(Vec3::ZERO, Quat::IDENTITY, &clock).unwrap();
//! clock.advance(10);
//! tracker.receive(Vec3::new(0.01, 0.0, 0.0), Quat::IDENTITY, &clock).unwrap();
//!
//! let pose = tracker.take_fresh().unwrap();
//! assert!((pose.velocity.x - 1.0).abs() < 1e-4);
//! assert!(tracker.take_fresh().is_none());
//! ```

use crate::{
    constants::{time::MIN_POSE_VELOCITY_DT_S, MAX_POSE_AGE_MS},
    errors::{CorrectionError, CorrectionResult},
    fusion::PoseObservation,
    spatial::{Quat, Vec3},
    time::{delta_ms, ms_to_s, TimeSource, Timestamp},
};

/// Bookkeeping for the external pose stream
#[derive(Debug, Clone, Default)]
pub struct ExternalPoseTracker {
    latest: Option<PoseObservation>,
    received_at: Timestamp,
    fresh: bool,
    received: u32,
}

impl ExternalPoseTracker {
    /// Tracker that has not seen a pose yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pose from the tracking system
    ///
    /// The orientation is normalized. Non-finite values or a zero quaternion
    /// are rejected and leave the tracker unchanged.
    pub fn receive<C: TimeSource>(
        &mut self,
        position: Vec3,
        orientation: Quat,
        clock: &C,
    ) -> CorrectionResult<PoseObservation> {
        if !position.is_finite() {
            return Err(CorrectionError::InvalidObservation { reason: "non-finite position" });
        }
        if !orientation.is_finite() || orientation.norm() <= f32::EPSILON {
            return Err(CorrectionError::InvalidObservation { reason: "unusable quaternion" });
        }

        let now = clock.now();
        let velocity = match &self.latest {
            Some(prev) => {
                let dt = ms_to_s(delta_ms(self.received_at, now)).max(MIN_POSE_VELOCITY_DT_S);
                (position - prev.position) * (1.0 / dt)
            }
            None => Vec3::ZERO,
        };

        let pose = PoseObservation::new(position, velocity, orientation.normalize());
        self.latest = Some(pose);
        self.received_at = now;
        self.fresh = true;
        self.received = self.received.wrapping_add(1);
        Ok(pose)
    }

    /// The newest pose if it has not been taken yet
    pub fn take_fresh(&mut self) -> Option<PoseObservation> {
        if core::mem::take(&mut self.fresh) {
            self.latest
        } else {
            None
        }
    }

    /// True if a pose arrived since the last [`take_fresh`](Self::take_fresh)
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Newest pose, fresh or not
    pub fn latest(&self) -> Option<&PoseObservation> {
        self.latest.as_ref()
    }

    /// Milliseconds since the newest pose, at most 10 000
    ///
    /// Saturates when no pose has arrived yet.
    pub fn age_ms<C: TimeSource>(&self, clock: &C) -> u32 {
        if self.latest.is_none() {
            return MAX_POSE_AGE_MS;
        }
        let age = delta_ms(self.received_at, clock.now());
        age.min(MAX_POSE_AGE_MS as u64) as u32
    }

    /// Number of accepted poses (wrapping)
    pub fn received_count(&self) -> u32 {
        self.received
    }
}
