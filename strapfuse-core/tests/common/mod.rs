//! Common test utilities for integration tests
//!
//! This module provides:
//! - A deterministic RNG for sensor noise
//! - Ground-truth flight scenarios with matching IMU samples
//! - Assertion helpers for vectors and quaternions

#![allow(dead_code)]

pub mod scenarios;

use strapfuse_core::spatial::{Quat, Vec3};

/// Deterministic random number generator for tests
pub struct TestRng {
    state: u32,
}

impl TestRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u32(&mut self) -> u32 {
        // Xorshift algorithm
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / 16777216.0
    }

    pub fn gen_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Uniform noise in `[-amplitude, amplitude]` on each axis
    pub fn vec3(&mut self, amplitude: f32) -> Vec3 {
        Vec3::new(
            self.gen_range(-amplitude, amplitude),
            self.gen_range(-amplitude, amplitude),
            self.gen_range(-amplitude, amplitude),
        )
    }
}

/// Angle of the rotation taking `a` to `b` (rad)
pub fn angle_between(a: Quat, b: Quat) -> f32 {
    let r = a.conjugate() * b;
    2.0 * libm::atan2f(r.imag().norm(), r.w.abs())
}

#[macro_export]
macro_rules! assert_within_tolerance {
    ($actual:expr, $expected:expr, $tolerance:expr) => {
        let diff = ($actual - $expected).abs();
        if diff > $tolerance {
            panic!(
                "Value {} not within tolerance {} of expected {} (diff: {})",
                $actual, $tolerance, $expected, diff
            );
        }
    };
}

#[macro_export]
macro_rules! assert_vec_near {
    ($actual:expr, $expected:expr, $tolerance:expr) => {
        let diff = ($actual - $expected).norm();
        if diff > $tolerance {
            panic!(
                "Vector {:?} not within {} of {:?} (distance: {})",
                $actual, $tolerance, $expected, diff
            );
        }
    };
}
