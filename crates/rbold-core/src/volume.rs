//! Gridded volume frames.

use ndarray::Array3;

use crate::affine::Affine;

/// One 3-D scalar volume plus its voxel-to-physical affine.
///
/// A functional run is an ordered sequence of frames, one per acquired
/// timepoint; each frame may carry its own motion-correction transform and
/// distortion-correction field alongside (held by the run, not the frame).
#[derive(Debug, Clone)]
pub struct VolumeFrame {
    data: Array3<f64>,
    affine: Affine,
}

impl VolumeFrame {
    /// Create a frame from voxel data and its voxel-to-physical affine.
    pub fn new(data: Array3<f64>, affine: Affine) -> Self {
        Self { data, affine }
    }

    /// The voxel data.
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// The voxel-to-physical affine.
    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// Grid shape `(i, j, k)`.
    pub fn shape(&self) -> [usize; 3] {
        let s = self.data.shape();
        [s[0], s[1], s[2]]
    }
}
