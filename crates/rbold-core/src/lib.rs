//! Core resampling engine for 4-D functional imaging timeseries.
//!
//! This crate contains the numeric heart of rbold: homogeneous affine
//! algebra, coordinate sets, displacement-field sampling, gridded volume
//! interpolation, the one-step/two-step frame resampler, and per-frame
//! result aggregation. It has no IO and no knowledge of any on-disk
//! pipeline layout; loaders live in `rbold-io` and orchestration in
//! `rbold-pipeline`.

pub mod affine;
pub mod aggregate;
pub mod coords;
pub mod error;
pub mod interp;
pub mod resample;
pub mod volume;
pub mod warp;

pub use affine::Affine;
pub use aggregate::{stack_frames, FrameSample, RunResult};
pub use coords::CoordinateSet;
pub use error::{CoreError, Result};
pub use interp::{InterpOrder, SampleSpec};
pub use resample::{resample_native, resample_prealigned, FrameCallback};
pub use volume::VolumeFrame;
pub use warp::DisplacementField;
