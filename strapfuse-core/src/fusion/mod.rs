//! Error-State Sensor Fusion
//!
//! ## Overview
//!
//! This module fuses a high-rate inertial stream with a low-rate external pose
//! stream (motion capture) into a full navigation estimate. It is an *indirect*
//! (error-state) EKF:
//!
//! ```text
//!  IMU (500 Hz) ──→ dead-reckoning integrator ──→ nominal state
//!                         │                           │
//!                         └── covariance of the ──────┤
//!                             integrator error        │
//!  Pose (~100 Hz) ─────────────→ correction ──────────┘
//! ```
//!
//! The filter does not track position/velocity/attitude directly. It tracks the
//! *error* of a simple integrator. Attitude error is a 3-vector of small angles,
//! so the 4-component quaternion never enters the covariance and the EKF
//! quantities stay close to zero.
//!
//! ## Error State
//!
//! ```text
//! index  0..3   position error      (m)
//! index  3..6   velocity error      (m/s)
//! index  6..9   attitude error      (rad, small angle)
//! ```
//!
//! ## Steps
//!
//! ### Propagation
//! ```text
//! q  ← normalize(q + dt/2·Ω(ω)·q)
//! v  ← v + dt·(R(q)·a − g)
//! p  ← p + dt·v
//! P  ← F·P·Fᵀ + dt·G·Qd·Gᵀ
//! ```
//!
//! ### Correction (H = I)
//! ```text
//! S  = P + R
//! K  = P·S⁻¹                      (Cholesky)
//! Δ  = K·y
//! P  ← (I−K)·P·(I−K)ᵀ + K·R·Kᵀ     (Joseph form)
//! ```
//!
//! ## Memory Model
//!
//! Everything lives on the stack:
//! ```text
//! FilterState size:
//! ├── position, velocity, acceleration:  3 × 12 bytes
//! ├── orientation:                       16 bytes
//! └── covariance:                        9 × 9 × 4 = 324 bytes
//! ```
//! The largest transient in a correction is four 9×9 matrices (~1.3 KB).

pub mod dynamics;
pub mod ekf;

pub use dynamics::{dynamics_jacobian, process_noise, NoiseInputMatrix};
pub use ekf::{Correction, Ekf, EkfConfig, FilterState, Integration, PoseObservation};

/// Error-state dimension (position, velocity, attitude error)
pub const EKF_N: usize = 9;

/// Measurement dimension (full pose + velocity)
pub const EKF_M: usize = 9;

/// Process-noise input dimension (gyro + accelerometer)
pub const EKF_DISTURBANCE: usize = 6;

/// Matrix operations for the filter
///
/// Fixed-size, row-major, single precision. No heap allocation.
pub mod matrix {
    use libm::sqrtf;

    use crate::errors::NotPositiveDefinite;
    use crate::spatial::Mat33;

    /// Matrix type using const generics
    pub type Matrix<const R: usize, const C: usize> = [[f32; C]; R];

    /// Square matrix type
    pub type SquareMatrix<const N: usize> = Matrix<N, N>;

    /// Vector type
    pub type Vector<const N: usize> = [f32; N];

    /// Operand form for [`gemm`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Op {
        /// Use the matrix as stored
        NoTrans,
        /// Use the transpose
        Trans,
    }

    impl Op {
        /// Shape of `op(A)` for a stored `rows × cols` matrix
        const fn shape(self, rows: usize, cols: usize) -> (usize, usize) {
            match self {
                Op::NoTrans => (rows, cols),
                Op::Trans => (cols, rows),
            }
        }
    }

    #[inline(always)]
    fn element<const R: usize, const C: usize>(m: &Matrix<R, C>, op: Op, i: usize, j: usize) -> f32 {
        match op {
            Op::NoTrans => m[i][j],
            Op::Trans => m[j][i],
        }
    }

    /// General matrix multiply: `C = beta·C + alpha·op(A)·op(B)`
    ///
    /// Dimensions: `op(A)[m×k] · op(B)[k×n] = C[m×n]`. Shapes come from the
    /// const parameters and are checked in debug builds.
    ///
    /// With `beta == 0` the previous contents of `C` are ignored, so `C` may
    /// hold garbage (including NaN) on entry.
    #[allow(clippy::too_many_arguments)]
    pub fn gemm<
        const AR: usize,
        const AC: usize,
        const BR: usize,
        const BC: usize,
        const CR: usize,
        const CC: usize,
    >(
        op_a: Op,
        a: &Matrix<AR, AC>,
        op_b: Op,
        b: &Matrix<BR, BC>,
        alpha: f32,
        beta: f32,
        c: &mut Matrix<CR, CC>,
    ) {
        let (m, k) = op_a.shape(AR, AC);
        let (kb, n) = op_b.shape(BR, BC);
        debug_assert!(k == kb, "gemm: inner dimensions {} and {} differ", k, kb);
        debug_assert!(m == CR && n == CC, "gemm: output is {}×{}, expected {}×{}", CR, CC, m, n);

        for i in 0..m {
            for j in 0..n {
                let mut accum = 0.0;
                for w in 0..k {
                    accum += element(a, op_a, i, w) * element(b, op_b, w, j);
                }
                c[i][j] = if beta == 0.0 {
                    alpha * accum
                } else {
                    beta * c[i][j] + alpha * accum
                };
            }
        }
    }

    /// Matrix-vector multiplication: y = A × x
    pub fn matvec<const R: usize, const C: usize>(
        matrix: &Matrix<R, C>,
        vector: &Vector<C>,
        result: &mut Vector<R>,
    ) {
        for i in 0..R {
            result[i] = 0.0;
            for j in 0..C {
                result[i] += matrix[i][j] * vector[j];
            }
        }
    }

    /// Zero matrix
    pub const fn zeros<const R: usize, const C: usize>() -> Matrix<R, C> {
        [[0.0; C]; R]
    }

    /// Identity matrix
    pub fn identity<const N: usize>() -> SquareMatrix<N> {
        let mut m = zeros::<N, N>();
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        m
    }

    /// Diagonal matrix from a vector
    pub fn diagonal<const N: usize>(d: &Vector<N>) -> SquareMatrix<N> {
        let mut m = zeros::<N, N>();
        for i in 0..N {
            m[i][i] = d[i];
        }
        m
    }

    /// Sum of the diagonal
    pub fn trace<const N: usize>(m: &SquareMatrix<N>) -> f32 {
        (0..N).map(|i| m[i][i]).sum()
    }

    /// True if no element is NaN or infinite
    pub fn all_finite<const R: usize, const C: usize>(m: &Matrix<R, C>) -> bool {
        m.iter().flatten().all(|v| v.is_finite())
    }

    /// Write a 3×3 block with its top-left corner at `(row, col)`
    pub fn set_block33<const R: usize, const C: usize>(
        m: &mut Matrix<R, C>,
        row: usize,
        col: usize,
        block: &Mat33,
    ) {
        for i in 0..3 {
            m[row + i][col..col + 3].copy_from_slice(&block.m[i]);
        }
    }

    /// Make matrix symmetric: A = (A + Aᵀ) / 2
    ///
    /// Critical for maintaining positive definite covariance matrices
    pub fn make_symmetric<const N: usize>(matrix: &mut SquareMatrix<N>) {
        for i in 0..N {
            for j in i + 1..N {
                let avg = (matrix[i][j] + matrix[j][i]) * 0.5;
                matrix[i][j] = avg;
                matrix[j][i] = avg;
            }
        }
    }

    /// Cholesky decomposition: A = L × Lᵀ
    ///
    /// ## Algorithm
    ///
    /// For each element:
    /// - Diagonal: L[j,j] = sqrt(A[j,j] - Σ(L[j,k]²))
    /// - Below diagonal: L[i,j] = (A[i,j] - Σ(L[i,k]×L[j,k])) / L[j,j]
    ///
    /// Only the lower triangle of `a` is read. Fails on the first pivot that
    /// is not strictly positive (or not finite).
    pub fn cholesky<const N: usize>(
        a: &SquareMatrix<N>,
        l: &mut SquareMatrix<N>,
    ) -> Result<(), NotPositiveDefinite> {
        *l = zeros();

        for j in 0..N {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[j][k] * l[j][k];
            }

            let diag_val = a[j][j] - sum;
            if diag_val <= 0.0 || !diag_val.is_finite() {
                return Err(NotPositiveDefinite { pivot: j });
            }
            l[j][j] = sqrtf(diag_val);

            for i in (j + 1)..N {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l[i][k] * l[j][k];
                }
                l[i][j] = (a[i][j] - sum) / l[j][j];
            }
        }

        Ok(())
    }

    /// Solve linear system A×x = b using forward/back substitution
    ///
    /// Assumes A is already decomposed using Cholesky: A = L×Lᵀ
    pub fn solve_cholesky<const N: usize>(
        l: &SquareMatrix<N>,
        b: &Vector<N>,
        x: &mut Vector<N>,
    ) {
        // Forward substitution: solve L×y = b
        let mut y = [0.0; N];
        for i in 0..N {
            let mut sum = 0.0;
            for j in 0..i {
                sum += l[i][j] * y[j];
            }
            y[i] = (b[i] - sum) / l[i][i];
        }

        // Back substitution: solve Lᵀ×x = y
        for i in (0..N).rev() {
            let mut sum = 0.0;
            for j in (i + 1)..N {
                sum += l[j][i] * x[j];
            }
            x[i] = (y[i] - sum) / l[i][i];
        }
    }

    /// Inverse of a symmetric positive-definite matrix
    ///
    /// Factors once, then solves `A·x = eᵢ` column by column. The result is
    /// symmetrized before returning.
    pub fn invert_spd<const N: usize>(
        a: &SquareMatrix<N>,
        inv: &mut SquareMatrix<N>,
    ) -> Result<(), NotPositiveDefinite> {
        let mut l = zeros::<N, N>();
        cholesky(a, &mut l)?;

        let mut unit = [0.0; N];
        let mut column = [0.0; N];
        for j in 0..N {
            unit[j] = 1.0;
            solve_cholesky(&l, &unit, &mut column);
            unit[j] = 0.0;
            for i in 0..N {
                inv[i][j] = column[i];
            }
        }

        make_symmetric(inv);
        Ok(())
    }
}
