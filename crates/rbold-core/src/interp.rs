//! Gridded volume interpolation.
//!
//! Evaluates discretely-gridded data at floating-point voxel coordinates
//! with a configurable interpolation order. Queries whose support stencil
//! leaves the grid return a fill value (NaN by default) instead of
//! clamping or raising; NaN query coordinates likewise resolve to the fill
//! value. Coordinate column `c` indexes data axis `c`.

use ndarray::{Array1, Array2, ArrayView2, ArrayView3, ArrayView4};

/// Interpolation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpOrder {
    /// Order 0: nearest-neighbour.
    Nearest,
    /// Order 1: trilinear.
    Linear,
}

/// How a volume is sampled: interpolation order plus the out-of-support
/// fill value.
#[derive(Debug, Clone, Copy)]
pub struct SampleSpec {
    pub order: InterpOrder,
    pub fill: f64,
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            order: InterpOrder::Linear,
            fill: f64::NAN,
        }
    }
}

/// Sample a 3-D scalar grid at continuous voxel coordinates.
///
/// # Arguments
/// * `data` - Scalar grid, axes `(i, j, k)`
/// * `coords` - `[N, >=3]` voxel-space query coordinates; only the first
///   three columns are read, so homogeneous `[N, 4]` sets work directly
/// * `spec` - Interpolation order and fill value
///
/// # Returns
/// One value per query coordinate, `[N]`.
pub fn sample_volume(
    data: ArrayView3<'_, f64>,
    coords: ArrayView2<'_, f64>,
    spec: &SampleSpec,
) -> Array1<f64> {
    let dims = [data.shape()[0], data.shape()[1], data.shape()[2]];
    let mut out = Array1::from_elem(coords.nrows(), spec.fill);
    for (row, value) in coords.rows().into_iter().zip(out.iter_mut()) {
        let p = [row[0], row[1], row[2]];
        *value = match spec.order {
            InterpOrder::Nearest => sample_nearest(&data, dims, p).unwrap_or(spec.fill),
            InterpOrder::Linear => sample_trilinear(&data, dims, p).unwrap_or(spec.fill),
        };
    }
    out
}

/// Sample a channel-last 4-D grid at continuous voxel coordinates.
///
/// The same stencil and weights apply to every channel, so a query outside
/// the spatial support fills the entire output row.
///
/// # Arguments
/// * `data` - Grid with axes `(i, j, k, channel)`
/// * `coords` - `[N, >=3]` voxel-space query coordinates
/// * `spec` - Interpolation order and fill value
///
/// # Returns
/// `[N, channels]` interpolated vectors.
pub fn sample_channels(
    data: ArrayView4<'_, f64>,
    coords: ArrayView2<'_, f64>,
    spec: &SampleSpec,
) -> Array2<f64> {
    let dims = [data.shape()[0], data.shape()[1], data.shape()[2]];
    let channels = data.shape()[3];
    let mut out = Array2::from_elem((coords.nrows(), channels), spec.fill);
    for (row, mut values) in coords.rows().into_iter().zip(out.rows_mut()) {
        let p = [row[0], row[1], row[2]];
        match spec.order {
            InterpOrder::Nearest => {
                if let Some([i, j, k]) = nearest_stencil(dims, p) {
                    for c in 0..channels {
                        values[c] = data[[i, j, k, c]];
                    }
                }
            }
            InterpOrder::Linear => {
                if let Some(stencil) = linear_stencil(dims, p) {
                    for c in 0..channels {
                        values[c] = stencil.evaluate(|i, j, k| data[[i, j, k, c]]);
                    }
                }
            }
        }
    }
    out
}

fn sample_nearest(data: &ArrayView3<'_, f64>, dims: [usize; 3], p: [f64; 3]) -> Option<f64> {
    let [i, j, k] = nearest_stencil(dims, p)?;
    Some(data[[i, j, k]])
}

fn sample_trilinear(data: &ArrayView3<'_, f64>, dims: [usize; 3], p: [f64; 3]) -> Option<f64> {
    let stencil = linear_stencil(dims, p)?;
    Some(stencil.evaluate(|i, j, k| data[[i, j, k]]))
}

/// Rounded index of a query point, or None outside the support.
fn nearest_stencil(dims: [usize; 3], p: [f64; 3]) -> Option<[usize; 3]> {
    let mut idx = [0usize; 3];
    for axis in 0..3 {
        let rounded = p[axis].round();
        // NaN fails the range check and falls through to the fill value.
        if !(rounded >= 0.0 && rounded <= (dims[axis] - 1) as f64) {
            return None;
        }
        idx[axis] = rounded as usize;
    }
    Some(idx)
}

/// Corner indices and weights for trilinear interpolation.
struct LinearStencil {
    lo: [usize; 3],
    hi: [usize; 3],
    frac: [f64; 3],
}

impl LinearStencil {
    fn evaluate(&self, get: impl Fn(usize, usize, usize) -> f64) -> f64 {
        let [fi, fj, fk] = self.frac;
        let mut acc = 0.0;
        for (ci, &i) in [self.lo[0], self.hi[0]].iter().enumerate() {
            let wi = if ci == 0 { 1.0 - fi } else { fi };
            for (cj, &j) in [self.lo[1], self.hi[1]].iter().enumerate() {
                let wj = if cj == 0 { 1.0 - fj } else { fj };
                for (ck, &k) in [self.lo[2], self.hi[2]].iter().enumerate() {
                    let wk = if ck == 0 { 1.0 - fk } else { fk };
                    acc += wi * wj * wk * get(i, j, k);
                }
            }
        }
        acc
    }
}

/// Build the trilinear stencil for a query point, or None outside the
/// support `[0, dim-1]` on any axis.
fn linear_stencil(dims: [usize; 3], p: [f64; 3]) -> Option<LinearStencil> {
    let mut lo = [0usize; 3];
    let mut hi = [0usize; 3];
    let mut frac = [0.0f64; 3];
    for axis in 0..3 {
        let max = (dims[axis] - 1) as f64;
        let x = p[axis];
        if !(x >= 0.0 && x <= max) {
            return None;
        }
        let floor = x.floor();
        lo[axis] = floor as usize;
        // On the upper boundary the fraction is zero, so the collapsed
        // upper corner never contributes.
        hi[axis] = (lo[axis] + 1).min(dims[axis] - 1);
        frac[axis] = x - floor;
    }
    Some(LinearStencil { lo, hi, frac })
}
