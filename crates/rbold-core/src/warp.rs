//! Dense displacement (warp) field sampling.
//!
//! A displacement field is a grid of 3-vector offsets with its own
//! voxel-to-physical affine; it represents a nonlinear deformation between
//! two spaces. One field may apply globally (subject to template) or per
//! volume (per-timepoint distortion correction).

use ndarray::{Array2, Array4};

use crate::affine::Affine;
use crate::coords::CoordinateSet;
use crate::error::{CoreError, Result};
use crate::interp::{sample_channels, SampleSpec};

/// A dense grid of displacement 3-vectors, channel-last `[X, Y, Z, 3]`.
#[derive(Debug, Clone)]
pub struct DisplacementField {
    data: Array4<f64>,
    affine: Affine,
}

impl DisplacementField {
    /// Create a field from channel-last displacement data and the field's
    /// own voxel-to-physical affine.
    pub fn new(data: Array4<f64>, affine: Affine) -> Result<Self> {
        if data.shape()[3] != 3 {
            return Err(CoreError::ShapeMismatch {
                expected: vec![data.shape()[0], data.shape()[1], data.shape()[2], 3],
                actual: data.shape().to_vec(),
            });
        }
        Ok(Self { data, affine })
    }

    /// The displacement grid.
    pub fn data(&self) -> &Array4<f64> {
        &self.data
    }

    /// The field's voxel-to-physical affine.
    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// Evaluate the displacement at physical-space query coordinates.
    ///
    /// Queries are mapped into the field's own voxel space through the
    /// inverted field affine, then each displacement component is
    /// interpolated. Queries outside the field's grid resolve to the fill
    /// value of `spec` on all three components.
    ///
    /// # Returns
    /// `[N, 3]` per-point displacement, to be added to the first three
    /// columns of the coordinate set being warped.
    pub fn sample(&self, coords: &CoordinateSet, spec: &SampleSpec) -> Result<Array2<f64>> {
        let voxel = coords.transformed(&self.affine.invert()?);
        Ok(sample_channels(self.data.view(), voxel.array(), spec))
    }
}
