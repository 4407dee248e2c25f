//! IO layer for rbold.
//!
//! Loads gridded volumes and displacement fields from NIfTI, linear
//! transforms from plain-text matrix files, and writes stacked timeseries
//! artifacts as `.npy`. Every loader returns the numerical types the core
//! consumes; on-disk format details stay inside this crate.

pub mod combined;
pub mod discovery;
pub mod linear;
pub mod nifti_io;
pub mod output;

pub use combined::load_combined;
pub use discovery::sorted_files_with_suffix;
pub use linear::{load_affine_series, load_rigid, write_affines};
pub use nifti_io::{load_volume, load_warp};
pub use output::{write_npy, write_run_result};
