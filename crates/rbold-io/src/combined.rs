//! Combined nonlinear registration bundles.
//!
//! A subject-to-template registration consists of an affine plus a dense
//! displacement field. The field's own grid affine must match the
//! configured template reference affine exactly; a mismatch means the
//! bundle was produced against a different grid and is fatal at setup.

use anyhow::{ensure, Result};
use rbold_core::{Affine, DisplacementField};
use std::path::Path;

use crate::linear::load_rigid;
use crate::nifti_io::load_warp;

/// Load the affine and displacement field of a combined registration.
///
/// # Arguments
/// * `affine_path` - Plain-text 4x4 affine file
/// * `warp_path` - NIfTI displacement field
/// * `reference` - The expected grid affine of the displacement field
pub fn load_combined<P: AsRef<Path>, Q: AsRef<Path>>(
    affine_path: P,
    warp_path: Q,
    reference: &Affine,
) -> Result<(Affine, DisplacementField)> {
    let affine = load_rigid(affine_path)?;
    let warp = load_warp(warp_path.as_ref())?;
    ensure!(
        warp.affine().max_abs_diff(reference) == 0.0,
        "Displacement field affine in {} does not match the reference grid affine",
        warp_path.as_ref().display()
    );
    Ok((affine, warp))
}
