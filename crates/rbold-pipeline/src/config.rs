//! Workflow configuration.
//!
//! Everything a workflow consumes is named explicitly here: the rigid
//! transform file, each run's directory, each hemisphere's surface data,
//! the requested output combinations, and each template grid with its
//! subject-to-template bundle and region table. Nothing is discovered
//! from ambient conventions.

use anyhow::{Context, Result};
use rbold_core::{InterpOrder, SampleSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::combos::Combination;

/// Interpolation order, as configured.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpChoice {
    Nearest,
    #[default]
    Linear,
}

impl From<InterpChoice> for InterpOrder {
    fn from(choice: InterpChoice) -> Self {
        match choice {
            InterpChoice::Nearest => InterpOrder::Nearest,
            InterpChoice::Linear => InterpOrder::Linear,
        }
    }
}

/// One run's source directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Run label used in output file names, e.g. `"task-movie_run-01"`.
    pub label: String,
    /// Directory with the layout `FunctionalRun::from_workflow_dir` reads.
    pub dir: PathBuf,
}

/// One hemisphere's surface data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Hemisphere label, e.g. `"l"` or `"r"`.
    pub hemisphere: String,
    /// Directory with per-projection coordinate and resampling-matrix
    /// `.npy` files.
    pub dir: PathBuf,
}

/// Requested surface output combinations for one target space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceConfig {
    /// Target space label, e.g. `"onavg-ico32"`.
    pub space: String,
    /// Combination tags, e.g. `"1step_pial_area"`.
    pub tags: Vec<String>,
}

/// The subject's canonical anatomical grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalConfig {
    /// Grid shape `[X, Y, Z]`.
    pub shape: [usize; 3],
    /// Grid voxel-to-physical affine, row-major.
    pub grid_affine: [[f64; 4]; 4],
    /// Combination tags; only the step prefix changes the computation.
    pub tags: Vec<String>,
}

/// One template grid with its subject-to-template alignment bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Template name used in output paths, e.g. `"mni"`.
    pub name: String,
    /// Grid resolution in millimetres, used in output paths.
    pub resolution_mm: u32,
    /// Grid shape `[X, Y, Z]`.
    pub shape: [usize; 3],
    /// Grid voxel-to-physical affine, row-major.
    pub grid_affine: [[f64; 4]; 4],
    /// Text file with the template-to-anatomical affine of the bundle.
    pub to_anat_affine: PathBuf,
    /// NIfTI displacement field of the bundle, on this grid.
    pub warp: PathBuf,
    /// JSON region table mapping region keys to flat grid indices.
    pub regions: PathBuf,
    /// Combination tags; the projection/method parts label the output
    /// directory, only the step prefix changes the computation.
    pub tags: Vec<String>,
}

/// Full workflow description for one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Subject identifier used in output file names.
    pub subject: String,
    /// Root of the output tree.
    pub output_dir: PathBuf,
    /// Text file with the rigid native-to-anatomical transform.
    pub rigid: PathBuf,
    pub runs: Vec<RunConfig>,
    #[serde(default)]
    pub surfaces: Vec<SurfaceConfig>,
    #[serde(default)]
    pub surface_spaces: Vec<SpaceConfig>,
    #[serde(default)]
    pub canonical: Option<CanonicalConfig>,
    #[serde(default)]
    pub templates: Vec<TemplateConfig>,
    #[serde(default)]
    pub interpolation: InterpChoice,
    /// Out-of-support fill value; NaN when absent (JSON has no NaN).
    #[serde(default)]
    pub fill: Option<f64>,
    /// Worker thread count; the rayon default when absent.
    #[serde(default)]
    pub jobs: Option<usize>,
}

impl WorkflowConfig {
    /// Load a workflow description from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse workflow config {}", path.display()))
    }

    /// The interpolation spec every query in this workflow uses.
    pub fn sample_spec(&self) -> SampleSpec {
        SampleSpec {
            order: self.interpolation.into(),
            fill: self.fill.unwrap_or(f64::NAN),
        }
    }

    /// Decode every requested surface combination, failing on the first
    /// malformed tag.
    pub fn surface_combinations(&self) -> Result<Vec<Combination>> {
        let mut combos = Vec::new();
        for space in &self.surface_spaces {
            for tag in &space.tags {
                combos.push(Combination::decode(&space.space, tag)?);
            }
        }
        Ok(combos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "subject": "01",
        "output_dir": "/out",
        "rigid": "/data/rigid.txt",
        "runs": [{"label": "task-movie_run-01", "dir": "/data/run-01"}],
        "surface_spaces": [
            {"space": "onavg-ico32", "tags": ["1step_pial_area", "2step_pial_area"]}
        ]
    }"#;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: WorkflowConfig = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(config.subject, "01");
        assert_eq!(config.runs.len(), 1);
        assert!(config.templates.is_empty());
        assert!(config.jobs.is_none());

        let spec = config.sample_spec();
        assert!(matches!(spec.order, InterpOrder::Linear));
        assert!(spec.fill.is_nan());

        let combos = config.surface_combinations().unwrap();
        assert_eq!(combos.len(), 2);
        assert!(combos[0].one_step);
        assert!(!combos[1].one_step);
    }

    #[test]
    fn interpolation_choice_is_lowercase_in_json() {
        let text = r#"{
            "subject": "01",
            "output_dir": "/out",
            "rigid": "/data/rigid.txt",
            "runs": [],
            "interpolation": "nearest",
            "fill": 0.0
        }"#;
        let config: WorkflowConfig = serde_json::from_str(text).unwrap();
        let spec = config.sample_spec();
        assert!(matches!(spec.order, InterpOrder::Nearest));
        assert_eq!(spec.fill, 0.0);
    }

    #[test]
    fn malformed_tag_fails_combination_decode() {
        let mut config: WorkflowConfig = serde_json::from_str(MINIMAL).unwrap();
        config.surface_spaces[0].tags.push("bogus".to_string());
        assert!(config.surface_combinations().is_err());
    }
}
