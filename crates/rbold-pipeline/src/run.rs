//! Per-run source data and resampling dispatch.
//!
//! A [`FunctionalRun`] bundles everything the core resampler needs for one
//! acquisition run: the per-frame native volumes, the motion-correction
//! series, the run-to-anatomical registration, optional per-frame
//! distortion fields, and (when available) the series already resampled
//! onto a shared anatomical grid for the two-step path. All count
//! mismatches are fatal at load time, before any interpolation happens.

use anyhow::{bail, ensure, Context, Result};
use ndarray::{Array3, Dimension};
use rbold_core::{
    resample_native, resample_prealigned, Affine, CoordinateSet, DisplacementField,
    FrameCallback, RunResult, SampleSpec, VolumeFrame,
};
use rbold_io::{load_affine_series, load_rigid, load_volume, load_warp, sorted_files_with_suffix};
use std::path::Path;
use tracing::debug;

/// Which resampling path to take for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Compose all transforms into one hop and sample the raw frames.
    OneStep,
    /// Sample the series already resampled onto a shared anatomical grid.
    TwoStep,
}

/// A timeseries pre-resampled onto one shared anatomical grid.
pub struct PrealignedSeries {
    volumes: Vec<Array3<f64>>,
    affine: Affine,
}

impl PrealignedSeries {
    /// Assemble a series, checking every volume shares one grid.
    pub fn new(volumes: Vec<(Array3<f64>, Affine)>) -> Result<Self> {
        ensure!(!volumes.is_empty(), "Pre-aligned series is empty");
        let affine = volumes[0].1.clone();
        let shape = volumes[0].0.raw_dim();
        for (i, (data, vol_affine)) in volumes.iter().enumerate() {
            ensure!(
                data.raw_dim() == shape,
                "Pre-aligned volume {i} has shape {:?}, expected {:?}",
                data.shape(),
                shape.slice()
            );
            ensure!(
                vol_affine.max_abs_diff(&affine) < 1e-6,
                "Pre-aligned volume {i} sits on a different grid"
            );
        }
        Ok(Self {
            volumes: volumes.into_iter().map(|(data, _)| data).collect(),
            affine,
        })
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

/// One acquisition run's source data.
pub struct FunctionalRun {
    label: String,
    frames: Vec<VolumeFrame>,
    motion: Vec<Affine>,
    run_to_anat: Affine,
    warps: Option<Vec<DisplacementField>>,
    prealigned: Option<PrealignedSeries>,
}

impl FunctionalRun {
    /// Assemble a run from in-memory parts, enforcing count invariants.
    pub fn new(
        label: impl Into<String>,
        frames: Vec<VolumeFrame>,
        motion: Vec<Affine>,
        run_to_anat: Affine,
        warps: Option<Vec<DisplacementField>>,
        prealigned: Option<PrealignedSeries>,
    ) -> Result<Self> {
        let label = label.into();
        ensure!(!frames.is_empty(), "Run {label:?} has no frames");
        ensure!(
            motion.len() == frames.len(),
            "Run {label:?}: {} motion transforms for {} frames",
            motion.len(),
            frames.len()
        );
        if let Some(warps) = &warps {
            ensure!(
                warps.len() == frames.len(),
                "Run {label:?}: {} distortion fields for {} frames",
                warps.len(),
                frames.len()
            );
        }
        if let Some(prealigned) = &prealigned {
            ensure!(
                prealigned.len() == frames.len(),
                "Run {label:?}: pre-aligned series has {} volumes for {} frames",
                prealigned.len(),
                frames.len()
            );
        }
        Ok(Self {
            label,
            frames,
            motion,
            run_to_anat,
            warps,
            prealigned,
        })
    }

    /// Load a run from its workflow directory.
    ///
    /// Expected layout:
    /// ```text
    /// <dir>/motion.txt        motion-correction series, one matrix per frame
    /// <dir>/registration.txt  run-to-anatomical transform
    /// <dir>/vol/*.nii.gz      per-frame native volumes, sorted by name
    /// <dir>/warp/*.nii.gz     optional per-frame distortion fields
    /// <dir>/prealigned/*.nii.gz  optional shared-grid series for two-step
    /// ```
    pub fn from_workflow_dir<P: AsRef<Path>>(dir: P, label: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref();
        let label = label.into();

        let motion = load_affine_series(dir.join("motion.txt"))
            .with_context(|| format!("Run {label:?}: loading motion series"))?;
        let run_to_anat = load_rigid(dir.join("registration.txt"))
            .with_context(|| format!("Run {label:?}: loading registration"))?;

        let frame_files = sorted_files_with_suffix(&dir.join("vol"), ".nii.gz")?;
        let mut frames = Vec::with_capacity(frame_files.len());
        for file in &frame_files {
            let (data, affine) = load_volume(file)
                .with_context(|| format!("Run {label:?}: loading frame {}", file.display()))?;
            frames.push(VolumeFrame::new(data, affine));
        }

        let warp_files = sorted_files_with_suffix(&dir.join("warp"), ".nii.gz")?;
        let warps = if warp_files.is_empty() {
            None
        } else {
            let mut fields = Vec::with_capacity(warp_files.len());
            for file in &warp_files {
                fields.push(load_warp(file).with_context(|| {
                    format!("Run {label:?}: loading distortion field {}", file.display())
                })?);
            }
            Some(fields)
        };

        let prealigned_files = sorted_files_with_suffix(&dir.join("prealigned"), ".nii.gz")?;
        let prealigned = if prealigned_files.is_empty() {
            None
        } else {
            let mut volumes = Vec::with_capacity(prealigned_files.len());
            for file in &prealigned_files {
                volumes.push(load_volume(file).with_context(|| {
                    format!("Run {label:?}: loading pre-aligned volume {}", file.display())
                })?);
            }
            Some(PrealignedSeries::new(volumes)?)
        };

        debug!(
            run = %label,
            frames = frames.len(),
            warps = warps.as_ref().map_or(0, Vec::len),
            prealigned = prealigned.as_ref().map_or(0, PrealignedSeries::len),
            "loaded functional run"
        );
        Self::new(label, frames, motion, run_to_anat, warps, prealigned)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    /// Whether the two-step source series is available.
    pub fn has_prealigned(&self) -> bool {
        self.prealigned.is_some()
    }

    /// Resample this run at anatomical-space coordinates.
    pub fn resample(
        &self,
        strategy: Strategy,
        coords: &CoordinateSet,
        spec: &SampleSpec,
        callback: Option<FrameCallback<'_>>,
    ) -> Result<RunResult> {
        match strategy {
            Strategy::OneStep => Ok(resample_native(
                &self.frames,
                &self.motion,
                &self.run_to_anat,
                self.warps.as_deref(),
                coords,
                spec,
                callback,
            )?),
            Strategy::TwoStep => {
                let prealigned = match &self.prealigned {
                    Some(series) => series,
                    None => bail!(
                        "Run {:?} has no pre-aligned series for two-step resampling",
                        self.label
                    ),
                };
                Ok(resample_prealigned(
                    &prealigned.volumes,
                    &prealigned.affine,
                    coords,
                    spec,
                    callback,
                )?)
            }
        }
    }
}
