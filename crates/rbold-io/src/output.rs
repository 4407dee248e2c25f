//! Stacked timeseries output artifacts.
//!
//! One `.npy` file per (space, region-or-hemisphere, method, subject, run)
//! combination, shape `[N_timepoints, ...]`. Grouped results write one
//! file per region key through a caller-supplied path template.

use anyhow::{Context, Result};
use ndarray::Array2;
use rbold_core::RunResult;
use std::path::{Path, PathBuf};

/// Write one stacked array, creating parent directories as needed.
pub fn write_npy(path: &Path, array: &Array2<f64>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    ndarray_npy::write_npy(path, array)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Write a run result.
///
/// Stacked results go to `path_for("")`; grouped results write one file
/// per region key at `path_for(key)`. Returns the written paths.
pub fn write_run_result(
    result: &RunResult,
    path_for: impl Fn(&str) -> PathBuf,
) -> Result<Vec<PathBuf>> {
    match result {
        RunResult::Stacked(array) => {
            let path = path_for("");
            write_npy(&path, array)?;
            Ok(vec![path])
        }
        RunResult::Grouped(regions) => {
            let mut written = Vec::with_capacity(regions.len());
            for (key, array) in regions {
                let path = path_for(key);
                write_npy(&path, array)?;
                written.push(path);
            }
            Ok(written)
        }
    }
}
