//! NIfTI volume and warp-field loading.
//!
//! The voxel-to-physical affine comes from the sform when set, the qform
//! otherwise, and falls back to plain pixdim scaling when neither code is
//! present. Data converts to `f64` on load; the resampling core is
//! double-precision throughout.

use anyhow::{bail, Context, Result};
use ndarray::{Ix3, Ix4};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use rbold_core::{Affine, DisplacementField};
use std::path::Path;

/// Build the voxel-to-physical affine from a NIfTI header.
pub fn header_affine(header: &NiftiHeader) -> Affine {
    if header.sform_code > 0 {
        let r0 = header.srow_x;
        let r1 = header.srow_y;
        let r2 = header.srow_z;
        return Affine::from_rows([
            [r0[0] as f64, r0[1] as f64, r0[2] as f64, r0[3] as f64],
            [r1[0] as f64, r1[1] as f64, r1[2] as f64, r1[3] as f64],
            [r2[0] as f64, r2[1] as f64, r2[2] as f64, r2[3] as f64],
            [0.0, 0.0, 0.0, 1.0],
        ]);
    }

    if header.qform_code > 0 {
        // Quaternion form, per the NIfTI-1 standard.
        let b = header.quatern_b as f64;
        let c = header.quatern_c as f64;
        let d = header.quatern_d as f64;
        let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();

        let qfac = if header.pixdim[0] == 0.0 {
            1.0
        } else {
            header.pixdim[0] as f64
        };

        let r11 = a * a + b * b - c * c - d * d;
        let r12 = 2.0 * b * c - 2.0 * a * d;
        let r13 = 2.0 * b * d + 2.0 * a * c;

        let r21 = 2.0 * b * c + 2.0 * a * d;
        let r22 = a * a + c * c - b * b - d * d;
        let r23 = 2.0 * c * d - 2.0 * a * b;

        let r31 = 2.0 * b * d - 2.0 * a * c;
        let r32 = 2.0 * c * d + 2.0 * a * b;
        let r33 = a * a + d * d - c * c - b * b;

        let dx = header.pixdim[1] as f64;
        let dy = header.pixdim[2] as f64;
        let dz = header.pixdim[3] as f64 * qfac;

        return Affine::from_rows([
            [r11 * dx, r12 * dy, r13 * dz, header.quatern_x as f64],
            [r21 * dx, r22 * dy, r23 * dz, header.quatern_y as f64],
            [r31 * dx, r32 * dy, r33 * dz, header.quatern_z as f64],
            [0.0, 0.0, 0.0, 1.0],
        ]);
    }

    // Fallback: pixdim scaling only.
    let dx = header.pixdim[1] as f64;
    let dy = header.pixdim[2] as f64;
    let dz = header.pixdim[3] as f64;
    Affine::from_rows([
        [dx, 0.0, 0.0, 0.0],
        [0.0, dy, 0.0, 0.0],
        [0.0, 0.0, dz, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ])
}

/// Load a 3-D scalar volume and its voxel-to-physical affine.
pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<(ndarray::Array3<f64>, Affine)> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Failed to read NIfTI file {}", path.display()))?;
    let affine = header_affine(obj.header());

    let volume = obj
        .into_volume()
        .into_ndarray::<f64>()
        .context("Failed to convert volume to ndarray")?;
    if volume.ndim() != 3 {
        bail!(
            "Expected 3D volume in {}, found {} dimensions",
            path.display(),
            volume.ndim()
        );
    }
    let data = volume
        .into_dimensionality::<Ix3>()
        .context("Volume dimensionality conversion failed")?;
    Ok((data, affine))
}

/// Load a displacement (warp) field.
///
/// Accepts channel-last `[X, Y, Z, 3]` fields and the 5-D ITK layout
/// `[X, Y, Z, 1, 3]`, which is squeezed to channel-last.
pub fn load_warp<P: AsRef<Path>>(path: P) -> Result<DisplacementField> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Failed to read warp file {}", path.display()))?;
    let affine = header_affine(obj.header());

    let mut volume = obj
        .into_volume()
        .into_ndarray::<f64>()
        .context("Failed to convert warp field to ndarray")?;
    if volume.ndim() == 5 && volume.shape()[3] == 1 {
        volume = volume.remove_axis(ndarray::Axis(3));
    }
    if volume.ndim() != 4 {
        bail!(
            "Expected a 4D displacement field in {}, found shape {:?}",
            path.display(),
            volume.shape()
        );
    }
    let data = volume
        .into_dimensionality::<Ix4>()
        .context("Warp field dimensionality conversion failed")?;
    Ok(DisplacementField::new(data, affine)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};
    use nifti::writer::WriterOptions;
    use tempfile::tempdir;

    fn sform_header(affine: &Affine) -> NiftiHeader {
        let m = affine.matrix();
        let mut header = NiftiHeader::default();
        header.sform_code = 1;
        header.srow_x = [
            m[(0, 0)] as f32,
            m[(0, 1)] as f32,
            m[(0, 2)] as f32,
            m[(0, 3)] as f32,
        ];
        header.srow_y = [
            m[(1, 0)] as f32,
            m[(1, 1)] as f32,
            m[(1, 2)] as f32,
            m[(1, 3)] as f32,
        ];
        header.srow_z = [
            m[(2, 0)] as f32,
            m[(2, 1)] as f32,
            m[(2, 2)] as f32,
            m[(2, 3)] as f32,
        ];
        header
    }

    #[test]
    fn volume_round_trips_with_sform_affine() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("vol.nii");

        let data: Vec<f64> = (0..3 * 4 * 5).map(|x| x as f64).collect();
        let array = Array3::from_shape_vec((3, 4, 5), data)?;
        let affine = Affine::from_rows([
            [2.0, 0.0, 0.0, -10.0],
            [0.0, 2.0, 0.0, -20.0],
            [0.0, 0.0, 2.0, -30.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);

        WriterOptions::new(&file)
            .reference_header(&sform_header(&affine))
            .write_nifti(&array)?;

        let (loaded, loaded_affine) = load_volume(&file)?;
        assert_eq!(loaded.shape(), &[3, 4, 5]);
        assert_eq!(loaded[[0, 0, 0]], 0.0);
        assert_eq!(loaded[[2, 3, 4]], 59.0);
        assert!(loaded_affine.max_abs_diff(&affine) < 1e-6);
        Ok(())
    }

    #[test]
    fn warp_loads_channel_last() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("warp.nii");

        let field = Array4::from_shape_fn((4, 4, 4, 3), |(_, _, _, c)| c as f64 + 1.0);
        WriterOptions::new(&file)
            .reference_header(&sform_header(&Affine::identity()))
            .write_nifti(&field)?;

        let warp = load_warp(&file)?;
        assert_eq!(warp.data().shape(), &[4, 4, 4, 3]);
        assert_eq!(warp.data()[[0, 0, 0, 2]], 3.0);
        Ok(())
    }

    #[test]
    fn scalar_file_is_rejected_as_warp() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("scalar.nii");
        let array = Array3::<f64>::zeros((4, 4, 4));
        WriterOptions::new(&file).write_nifti(&array)?;
        assert!(load_warp(&file).is_err());
        Ok(())
    }
}
