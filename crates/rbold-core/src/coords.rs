//! Homogeneous coordinate sets.
//!
//! A [`CoordinateSet`] is an ordered batch of query locations in some named
//! space, stored as an `[N, 4]` array with a trailing homogeneous column of
//! ones. Target-space sets are built once (per subject) and copied per
//! frame before any in-place warp adjustment.

use ndarray::{Array2, ArrayView2};

use crate::affine::Affine;
use crate::error::{CoreError, Result};

/// Tolerance on the homogeneous trailing column at construction.
const HOMOGENEOUS_TOLERANCE: f64 = 1e-9;

/// An ordered set of homogeneous 3-D points, shape `[N, 4]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSet(Array2<f64>);

impl CoordinateSet {
    /// Wrap an existing `[N, 4]` array, validating the homogeneous column.
    pub fn from_array(coords: Array2<f64>) -> Result<Self> {
        if coords.ncols() != 4 {
            return Err(CoreError::ShapeMismatch {
                expected: vec![coords.nrows(), 4],
                actual: coords.shape().to_vec(),
            });
        }
        for (i, w) in coords.column(3).iter().enumerate() {
            if (w - 1.0).abs() > HOMOGENEOUS_TOLERANCE {
                return Err(CoreError::NotHomogeneous(format!(
                    "row {i} has trailing component {w}"
                )));
            }
        }
        Ok(Self(coords))
    }

    /// Build from plain 3-D points, appending the homogeneous column.
    pub fn from_points(points: &[[f64; 3]]) -> Self {
        let mut coords = Array2::ones((points.len(), 4));
        for (i, p) in points.iter().enumerate() {
            coords[[i, 0]] = p[0];
            coords[[i, 1]] = p[1];
            coords[[i, 2]] = p[2];
        }
        Self(coords)
    }

    /// Build the full voxel-grid coordinate set of a gridded volume, mapped
    /// into physical space by `affine`.
    ///
    /// Rows are ordered C-style over `(i, j, k)` with `k` varying fastest;
    /// this ordering is part of the contract for anything that indexes into
    /// the flat result (region tables in particular).
    pub fn voxel_grid(shape: [usize; 3], affine: &Affine) -> Self {
        let [nx, ny, nz] = shape;
        let mut coords = Array2::ones((nx * ny * nz, 4));
        let mut row = 0;
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    coords[[row, 0]] = i as f64;
                    coords[[row, 1]] = j as f64;
                    coords[[row, 2]] = k as f64;
                    row += 1;
                }
            }
        }
        Self(affine.apply(&coords))
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.0.nrows()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.nrows() == 0
    }

    /// View of the underlying `[N, 4]` array.
    pub fn array(&self) -> ArrayView2<'_, f64> {
        self.0.view()
    }

    /// Consume into the underlying array.
    pub fn into_array(self) -> Array2<f64> {
        self.0
    }

    /// A new set with `affine` applied to every point.
    pub fn transformed(&self, affine: &Affine) -> Self {
        Self(affine.apply(&self.0))
    }

    /// Add a per-point displacement to the spatial columns.
    ///
    /// Touches columns 0..3 only; the homogeneous column is untouched.
    pub fn add_displacement(&mut self, displacement: &Array2<f64>) -> Result<()> {
        let expected = vec![self.len(), 3];
        if displacement.shape() != expected.as_slice() {
            return Err(CoreError::ShapeMismatch {
                expected,
                actual: displacement.shape().to_vec(),
            });
        }
        let mut spatial = self.0.slice_mut(ndarray::s![.., 0..3]);
        spatial += displacement;
        Ok(())
    }
}
