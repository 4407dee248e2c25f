//! Homogeneous affine transform algebra.
//!
//! Affines are 4x4 `f64` matrices mapping homogeneous row vectors
//! `[x, y, z, 1]` between named spaces. Application follows the row-vector
//! convention: `coords @ M.T`. Composition is plain matrix multiplication
//! and inversion is checked for numerical conditioning; a failed inversion
//! is fatal, never silently replaced by identity.

use nalgebra::Matrix4;
use ndarray::Array2;

use crate::error::{CoreError, Result};

/// Maximum tolerated max-abs residual of `A * A^-1 - I` after inversion.
const INVERSION_TOLERANCE: f64 = 1e-8;

/// A 4x4 homogeneous affine transform between two coordinate spaces.
///
/// The wrapped matrix is immutable after construction; every derived
/// transform (composition, inverse) is a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Affine(Matrix4<f64>);

impl Affine {
    /// The identity transform.
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    /// Create from a nalgebra matrix.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self(matrix)
    }

    /// Create from row-major rows.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        let mut m = Matrix4::zeros();
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                m[(r, c)] = *v;
            }
        }
        Self(m)
    }

    /// The underlying 4x4 matrix.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }

    /// Compose two transforms: the result maps through `other` first, then
    /// `self` (`C = A * B`).
    pub fn compose(&self, other: &Affine) -> Affine {
        Affine(self.0 * other.0)
    }

    /// Invert the transform.
    ///
    /// Fails with [`CoreError::SingularTransform`] when no inverse exists
    /// and with [`CoreError::IllConditionedTransform`] when the round-trip
    /// residual `A * A^-1 - I` exceeds the conditioning tolerance.
    pub fn invert(&self) -> Result<Affine> {
        let inv = self
            .0
            .try_inverse()
            .ok_or_else(|| CoreError::SingularTransform(format!("{:?}", self.0)))?;

        let residual = (self.0 * inv - Matrix4::identity())
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        if residual > INVERSION_TOLERANCE {
            return Err(CoreError::IllConditionedTransform {
                residual,
                tolerance: INVERSION_TOLERANCE,
            });
        }
        Ok(Affine(inv))
    }

    /// Apply the transform to a batch of homogeneous points.
    ///
    /// # Arguments
    /// * `coords` - Array of shape `[N, 4]`, last column 1
    ///
    /// # Returns
    /// Array of shape `[N, 4]` containing `coords @ M.T`.
    pub fn apply(&self, coords: &Array2<f64>) -> Array2<f64> {
        coords.dot(&self.transposed_array())
    }

    /// The matrix transposed into an ndarray, ready for `coords.dot(..)`.
    pub(crate) fn transposed_array(&self) -> Array2<f64> {
        let mut out = Array2::zeros((4, 4));
        for r in 0..4 {
            for c in 0..4 {
                // out = M.T
                out[[r, c]] = self.0[(c, r)];
            }
        }
        out
    }

    /// Max-abs elementwise difference to another affine.
    pub fn max_abs_diff(&self, other: &Affine) -> f64 {
        (self.0 - other.0)
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn translation(t: [f64; 3]) -> Affine {
        Affine::from_rows([
            [1.0, 0.0, 0.0, t[0]],
            [0.0, 1.0, 0.0, t[1]],
            [0.0, 0.0, 1.0, t[2]],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    #[test]
    fn identity_leaves_points_unchanged() {
        let coords = array![[1.0, 2.0, 3.0, 1.0], [4.0, 5.0, 6.0, 1.0]];
        let out = Affine::identity().apply(&coords);
        assert_eq!(out, coords);
    }

    #[test]
    fn translation_moves_points() {
        let coords = array![[1.0, 2.0, 3.0, 1.0]];
        let out = translation([10.0, -1.0, 0.5]).apply(&coords);
        assert_eq!(out, array![[11.0, 1.0, 3.5, 1.0]]);
    }

    #[test]
    fn compose_applies_right_operand_first() {
        // Scale by 2, then translate by 1 in x.
        let scale = Affine::from_rows([
            [2.0, 0.0, 0.0, 0.0],
            [0.0, 2.0, 0.0, 0.0],
            [0.0, 0.0, 2.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let shift = translation([1.0, 0.0, 0.0]);

        let coords = array![[3.0, 0.0, 0.0, 1.0]];
        let out = shift.compose(&scale).apply(&coords);
        // 3 * 2 + 1 = 7, not (3 + 1) * 2 = 8.
        assert!((out[[0, 0]] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn invert_round_trips() {
        let a = Affine::from_rows([
            [0.0, -1.2, 0.0, 4.0],
            [1.1, 0.0, 0.0, -2.0],
            [0.0, 0.0, 0.9, 7.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let coords = array![[1.0, 2.0, 3.0, 1.0], [-4.0, 0.0, 2.5, 1.0]];
        let round = a.invert().unwrap().apply(&a.apply(&coords));
        for (x, y) in round.iter().zip(coords.iter()) {
            assert!((x - y).abs() < 1e-10);
        }
    }

    #[test]
    fn singular_matrix_fails_inversion() {
        let a = Affine::from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        assert!(matches!(
            a.invert(),
            Err(CoreError::SingularTransform(_))
        ));
    }
}
