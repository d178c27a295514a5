//! Spatial Math Primitives
//!
//! Small, allocation-free 3D types used by the filter:
//!
//! - [`Vec3`]: 3-vector (position, velocity, rates, rotation vectors)
//! - [`Quat`]: quaternion stored scalar-last (`x, y, z, w`)
//! - [`Mat33`]: row-major 3×3 matrix (rotation matrices, skew blocks)
//!
//! ## Conventions
//!
//! A unit quaternion `q` describes the vehicle attitude and rotates body-frame
//! vectors into the world frame:
//! ```text
//! v_world = q ⊗ (v_body, 0) ⊗ q*
//! ```
//! Multiplication is the Hamilton product. Roll/pitch/yaw use the aerospace
//! ZYX sequence in radians.
//!
//! All transcendental functions go through `libm` so the module builds without `std`.

use core::ops::{Add, AddAssign, Mul, Neg, Sub};

use libm::{asinf, atan2f, cosf, sinf, sqrtf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 3D vector
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Create from components
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Load from the first three elements of a slice
    ///
    /// Panics in debug builds if the slice is shorter than 3.
    pub fn from_slice(s: &[f32]) -> Self {
        debug_assert!(s.len() >= 3);
        Self::new(s[0], s[1], s[2])
    }

    /// Store into the first three elements of a slice
    pub fn store(&self, s: &mut [f32]) {
        debug_assert!(s.len() >= 3);
        s[0] = self.x;
        s[1] = self.y;
        s[2] = self.z;
    }

    /// Components as an array
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Dot product
    pub fn dot(&self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Cross product
    pub fn cross(&self, rhs: Self) -> Self {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    /// Squared magnitude
    pub fn norm_squared(&self) -> f32 {
        self.dot(*self)
    }

    /// Magnitude
    pub fn norm(&self) -> f32 {
        sqrtf(self.norm_squared())
    }

    /// True if every component is finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f32 {
    type Output = Vec3;

    fn mul(self, rhs: Vec3) -> Vec3 {
        rhs * self
    }
}

/// Row-major 3×3 matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat33 {
    /// Rows
    pub m: [[f32; 3]; 3],
}

impl Default for Mat33 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat33 {
    /// Identity matrix
    pub const IDENTITY: Self = Self::diagonal(1.0);

    /// Zero matrix
    pub const ZERO: Self = Self { m: [[0.0; 3]; 3] };

    /// `d·I`
    pub const fn diagonal(d: f32) -> Self {
        Self {
            m: [[d, 0.0, 0.0], [0.0, d, 0.0], [0.0, 0.0, d]],
        }
    }

    /// Cross-product matrix: `skew(v) * u == v × u`
    pub fn skew(v: Vec3) -> Self {
        Self {
            m: [
                [0.0, -v.z, v.y],
                [v.z, 0.0, -v.x],
                [-v.y, v.x, 0.0],
            ],
        }
    }

    /// `a·X + b·I`
    ///
    /// Used for the truncated Taylor blocks of the dynamics Jacobian.
    pub fn scaled_plus_identity(a: f32, x: &Self, b: f32) -> Self {
        let mut out = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                out.m[i][j] = a * x.m[i][j];
            }
            out.m[i][i] += b;
        }
        out
    }

    /// Matrix product `self · rhs`
    pub fn mul_mat(&self, rhs: &Self) -> Self {
        let mut out = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                let mut accum = 0.0;
                for k in 0..3 {
                    accum += self.m[i][k] * rhs.m[k][j];
                }
                out.m[i][j] = accum;
            }
        }
        out
    }

    /// Matrix-vector product
    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        Vec3::new(
            self.m[0][0] * v.x + self.m[0][1] * v.y + self.m[0][2] * v.z,
            self.m[1][0] * v.x + self.m[1][1] * v.y + self.m[1][2] * v.z,
            self.m[2][0] * v.x + self.m[2][1] * v.y + self.m[2][2] * v.z,
        )
    }

    /// Transpose
    pub fn transpose(&self) -> Self {
        let mut out = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                out.m[j][i] = self.m[i][j];
            }
        }
        out
    }

    /// Element-wise negation
    pub fn negated(&self) -> Self {
        self.scale(-1.0)
    }

    /// Element-wise scaling
    pub fn scale(&self, s: f32) -> Self {
        let mut out = *self;
        for row in out.m.iter_mut() {
            for e in row.iter_mut() {
                *e *= s;
            }
        }
        out
    }
}

/// Quaternion, scalar-last
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Quat {
    /// Vector part, x
    pub x: f32,
    /// Vector part, y
    pub y: f32,
    /// Vector part, z
    pub z: f32,
    /// Scalar part
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Quat {
    type Output = Self;

    /// Hamilton product
    fn mul(self, p: Self) -> Self {
        let q = self;
        Self {
            x: q.w * p.x + q.x * p.w + q.y * p.z - q.z * p.y,
            y: q.w * p.y - q.x * p.z + q.y * p.w + q.z * p.x,
            z: q.w * p.z + q.x * p.y - q.y * p.x + q.z * p.w,
            w: q.w * p.w - q.x * p.x - q.y * p.y - q.z * p.z,
        }
    }
}

impl Quat {
    /// No rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Create from components (scalar last)
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Create from a vector part and a scalar part
    pub const fn from_parts(v: Vec3, w: f32) -> Self {
        Self::new(v.x, v.y, v.z, w)
    }

    /// Load `[x, y, z, w]`
    pub const fn from_array(a: [f32; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    /// Components as `[x, y, z, w]`
    pub const fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Vector (imaginary) part
    pub const fn imag(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Euclidean norm of the four components
    pub fn norm(&self) -> f32 {
        sqrtf(self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w)
    }

    /// Unit quaternion with the same direction
    ///
    /// A zero quaternion has no direction; identity is returned instead of NaNs.
    pub fn normalize(&self) -> Self {
        let n = self.norm();
        if n <= 0.0 {
            return Self::IDENTITY;
        }
        let inv = 1.0 / n;
        Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    /// Conjugate
    pub fn conjugate(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Inverse of a unit quaternion (the conjugate)
    pub fn inverse(&self) -> Self {
        self.conjugate()
    }

    /// True if every component is finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }

    /// Rotate a vector by this quaternion
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        // v' = v + w·t + u × t, with t = 2·(u × v)
        let u = self.imag();
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(t)
    }

    /// Rotation matrix equivalent of [`Quat::rotate`]
    pub fn to_rotation_matrix(&self) -> Mat33 {
        let (x, y, z, w) = (self.x, self.y, self.z, self.w);
        Mat33 {
            m: [
                [1.0 - 2.0 * (y * y + z * z), 2.0 * (x * y - w * z), 2.0 * (w * y + x * z)],
                [2.0 * (x * y + w * z), 1.0 - 2.0 * (x * x + z * z), 2.0 * (y * z - w * x)],
                [2.0 * (x * z - w * y), 2.0 * (w * x + y * z), 1.0 - 2.0 * (x * x + y * y)],
            ],
        }
    }

    /// Quaternion from a proper rotation matrix
    pub fn from_rotation_matrix(r: &Mat33) -> Self {
        let m = &r.m;
        let trace = m[0][0] + m[1][1] + m[2][2];

        let q = if trace > 0.0 {
            let s = sqrtf(trace + 1.0) * 2.0; // 4w
            Self::new(
                (m[2][1] - m[1][2]) / s,
                (m[0][2] - m[2][0]) / s,
                (m[1][0] - m[0][1]) / s,
                0.25 * s,
            )
        } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
            let s = sqrtf(1.0 + m[0][0] - m[1][1] - m[2][2]) * 2.0; // 4x
            Self::new(
                0.25 * s,
                (m[0][1] + m[1][0]) / s,
                (m[0][2] + m[2][0]) / s,
                (m[2][1] - m[1][2]) / s,
            )
        } else if m[1][1] > m[2][2] {
            let s = sqrtf(1.0 + m[1][1] - m[0][0] - m[2][2]) * 2.0; // 4y
            Self::new(
                (m[0][1] + m[1][0]) / s,
                0.25 * s,
                (m[1][2] + m[2][1]) / s,
                (m[0][2] - m[2][0]) / s,
            )
        } else {
            let s = sqrtf(1.0 + m[2][2] - m[0][0] - m[1][1]) * 2.0; // 4z
            Self::new(
                (m[0][2] + m[2][0]) / s,
                (m[1][2] + m[2][1]) / s,
                0.25 * s,
                (m[1][0] - m[0][1]) / s,
            )
        };

        q.normalize()
    }

    /// Quaternion from roll, pitch, yaw (radians, ZYX order)
    pub fn from_rpy(rpy: Vec3) -> Self {
        let (sr, cr) = (sinf(rpy.x * 0.5), cosf(rpy.x * 0.5));
        let (sp, cp) = (sinf(rpy.y * 0.5), cosf(rpy.y * 0.5));
        let (sy, cy) = (sinf(rpy.z * 0.5), cosf(rpy.z * 0.5));

        Self::new(
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
            cr * cp * cy + sr * sp * sy,
        )
    }

    /// Roll, pitch, yaw (radians, ZYX order)
    pub fn to_rpy(&self) -> Vec3 {
        let (x, y, z, w) = (self.x, self.y, self.z, self.w);
        // clamp so rounding near gimbal lock cannot push asin out of its domain
        let sin_pitch = (2.0 * (w * y - x * z)).clamp(-1.0, 1.0);
        Vec3::new(
            atan2f(2.0 * (w * x + y * z), 1.0 - 2.0 * (x * x + y * y)),
            asinf(sin_pitch),
            atan2f(2.0 * (w * z + x * y), 1.0 - 2.0 * (y * y + z * z)),
        )
    }

    /// Small-rotation quaternion from a rotation vector
    ///
    /// Vector part is `v/2`, scalar part completes the unit norm. Past the
    /// point where that is impossible (`|v|²/4 ≥ 1`) the vector is scaled down
    /// so the result stays unit length.
    pub fn from_small_angle(v: Vec3) -> Self {
        let half_sq = v.norm_squared() * 0.25;
        if half_sq < 1.0 {
            Self::from_parts(v * 0.5, sqrtf(1.0 - half_sq))
        } else {
            let w = 1.0 / sqrtf(1.0 + half_sq);
            Self::from_parts(v * (0.5 * w), w)
        }
    }

    /// First-order attitude integration over one gyro sample
    ///
    /// `q + (dt/2)·Ω(ω)·q` (Trawny & Roumeliotis 2005). The result is not
    /// normalized; callers normalize once after integrating.
    pub fn gyro_update(&self, gyro: Vec3, dt: f32) -> Self {
        let q = self;
        let r = 0.5 * dt * gyro.x;
        let p = 0.5 * dt * gyro.y;
        let y = 0.5 * dt * gyro.z;

        Self::new(
            q.x + y * q.y - p * q.z + r * q.w,
            -y * q.x + q.y + r * q.z + p * q.w,
            p * q.x - r * q.y + q.z + y * q.w,
            -r * q.x - p * q.y - y * q.z + q.w,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::FRAC_PI_2;

    fn assert_vec_close(a: Vec3, b: Vec3, tol: f32) {
        assert!((a - b).norm() < tol, "{:?} != {:?}", a, b);
    }

    fn assert_same_rotation(a: Quat, b: Quat, tol: f32) {
        // q and -q are the same rotation
        let dot = a.x * b.x + a.y * b.y + a.z * b.z + a.w * b.w;
        assert!((dot.abs() - 1.0).abs() < tol, "{:?} != {:?}", a, b);
    }

    #[test]
    fn hamilton_product_identity_and_inverse() {
        let q = Quat::from_rpy(Vec3::new(0.3, -0.2, 1.1));
        assert_eq!(q * Quat::IDENTITY, q);
        assert_same_rotation(q * q.inverse(), Quat::IDENTITY, 1e-6);
    }

    #[test]
    fn rotate_matches_rotation_matrix() {
        let q = Quat::from_rpy(Vec3::new(0.4, 0.1, -0.7));
        let v = Vec3::new(1.0, -2.0, 0.5);
        assert_vec_close(q.rotate(v), q.to_rotation_matrix().mul_vec(v), 1e-5);
    }

    #[test]
    fn yaw_quarter_turn_maps_x_to_y() {
        let q = Quat::from_rpy(Vec3::new(0.0, 0.0, FRAC_PI_2));
        assert_vec_close(q.rotate(Vec3::new(1.0, 0.0, 0.0)), Vec3::new(0.0, 1.0, 0.0), 1e-6);
    }

    #[test]
    fn rpy_round_trip() {
        let rpy = Vec3::new(0.2, -0.5, 2.0);
        assert_vec_close(Quat::from_rpy(rpy).to_rpy(), rpy, 1e-5);
    }

    #[test]
    fn rotation_matrix_round_trip() {
        // large angle so the non-trace branches are exercised too
        for rpy in [
            Vec3::new(0.1, 0.2, 0.3),
            Vec3::new(3.0, 0.1, 0.0),
            Vec3::new(0.0, 0.1, 3.0),
            Vec3::new(0.2, 1.4, -3.0),
        ] {
            let q = Quat::from_rpy(rpy);
            let back = Quat::from_rotation_matrix(&q.to_rotation_matrix());
            assert_same_rotation(q, back, 1e-5);
        }
    }

    #[test]
    fn gyro_update_integrates_yaw_rate() {
        let mut q = Quat::IDENTITY;
        let rate = Vec3::new(0.0, 0.0, 1.0);
        for _ in 0..500 {
            q = q.gyro_update(rate, 0.002).normalize();
        }
        // one second at 1 rad/s
        assert!((q.to_rpy().z - 1.0).abs() < 1e-3);
        assert!((q.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn small_angle_quaternion_is_unit() {
        let small = Quat::from_small_angle(Vec3::new(0.01, -0.02, 0.03));
        assert!((small.norm() - 1.0).abs() < 1e-6);
        assert_vec_close(small.imag(), Vec3::new(0.005, -0.01, 0.015), 1e-7);

        let large = Quat::from_small_angle(Vec3::new(3.0, 0.0, 0.0));
        assert!((large.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_falls_back_to_identity() {
        assert_eq!(Quat::new(0.0, 0.0, 0.0, 0.0).normalize(), Quat::IDENTITY);
    }

    #[test]
    fn skew_is_cross_product() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-0.5, 0.25, 4.0);
        assert_vec_close(Mat33::skew(a).mul_vec(b), a.cross(b), 1e-6);
    }
}
