//! File-backed surface spaces.
//!
//! One directory per hemisphere, holding `{projection}_coords.npy` files
//! with `[N, 3]` native-space sample points and `to-{sphere}_{method}.npy`
//! vertex resampling matrices, where `{sphere}` is the expanded template
//! sphere name (see [`crate::combos::sphere_name`]).

use anyhow::{ensure, Context, Result};
use ndarray::{s, Array2};
use ndarray_npy::read_npy;
use rbold_core::CoordinateSet;
use std::path::{Path, PathBuf};

use crate::combos::sphere_name;
use crate::subject::SurfaceSpace;

/// Surface data loaded from a hemisphere directory.
pub struct FileSurface {
    dir: PathBuf,
}

impl FileSurface {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl SurfaceSpace for FileSurface {
    fn coordinates(&self, projection: &str) -> Result<CoordinateSet> {
        let path = self.dir.join(format!("{projection}_coords.npy"));
        let points: Array2<f64> = read_npy(&path)
            .with_context(|| format!("Failed to read surface coordinates {}", path.display()))?;
        ensure!(
            points.ncols() == 3,
            "Surface coordinates {} have {} columns, expected 3",
            path.display(),
            points.ncols()
        );
        let mut coords = Array2::ones((points.nrows(), 4));
        coords.slice_mut(s![.., 0..3]).assign(&points);
        Ok(CoordinateSet::from_array(coords)?)
    }

    fn resampling_matrix(&self, space: &str, method: &str) -> Result<Array2<f64>> {
        let path = self
            .dir
            .join(format!("to-{}_{}.npy", sphere_name(space), method));
        read_npy(&path)
            .with_context(|| format!("Failed to read resampling matrix {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::write_npy;
    use tempfile::tempdir;

    #[test]
    fn reads_projection_coordinates() -> Result<()> {
        let dir = tempdir()?;
        let points = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        write_npy(dir.path().join("pial_coords.npy"), &points)?;

        let surface = FileSurface::new(dir.path());
        let coords = surface.coordinates("pial")?;
        assert_eq!(coords.len(), 2);
        assert_eq!(coords.array()[[1, 1]], 5.0);
        assert_eq!(coords.array()[[1, 3]], 1.0);
        Ok(())
    }

    #[test]
    fn resolves_matrix_names_through_sphere_expansion() -> Result<()> {
        let dir = tempdir()?;
        let xform = array![[1.0, 0.0], [0.0, 1.0]];
        write_npy(dir.path().join("to-fsaverage_ico32_area.npy"), &xform)?;

        let surface = FileSurface::new(dir.path());
        let loaded = surface.resampling_matrix("fsavg-ico32", "area")?;
        assert_eq!(loaded, xform);
        Ok(())
    }

    #[test]
    fn missing_files_report_their_path() {
        let dir = tempdir().unwrap();
        let surface = FileSurface::new(dir.path());
        let err = surface.coordinates("pial").unwrap_err();
        assert!(format!("{err:#}").contains("pial_coords.npy"));
    }
}
