//! Run orchestration.
//!
//! Drives the resampler over every (run, combination) pair a workflow
//! requests. Output existence is the sole cache key: a request whose
//! output file already exists is skipped without loading the run, so
//! re-invocations after a partial failure redo only the missing work.

use anyhow::{anyhow, bail, ensure, Context, Result};
use rayon::prelude::*;
use rbold_core::{Affine, CoordinateSet, RunResult, SampleSpec};
use rbold_io::{load_combined, load_rigid, write_npy};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::combos::Combination;
use crate::config::{CanonicalConfig, TemplateConfig, WorkflowConfig};
use crate::region::RegionTable;
use crate::run::{FunctionalRun, Strategy};
use crate::subject::{GridSpec, Subject};
use crate::surface::FileSurface;

/// The canonical grid's prepared query state, shared across runs.
pub struct CanonicalRequest {
    coords: CoordinateSet,
    combos: Vec<Combination>,
}

impl CanonicalRequest {
    /// Build the canonical grid's coordinates through the subject's rigid
    /// transform and decode its requested combinations.
    pub fn from_config(subject: &mut Subject, config: &CanonicalConfig) -> Result<Self> {
        let grid = GridSpec {
            shape: config.shape,
            affine: Affine::from_rows(config.grid_affine),
        };
        ensure!(!grid.is_empty(), "Canonical grid is empty");
        subject.prepare_canonical(&grid);
        let coords = subject
            .canonical_coords()
            .cloned()
            .ok_or_else(|| anyhow!("Canonical coordinates were not prepared"))?;
        let combos = config
            .tags
            .iter()
            .map(|tag| Combination::decode("canonical", tag))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { coords, combos })
    }
}

/// One template grid's prepared query state, shared across runs.
pub struct TemplateRequest {
    name: String,
    resolution_mm: u32,
    coords: CoordinateSet,
    regions: RegionTable,
    combos: Vec<Combination>,
}

impl TemplateRequest {
    /// Load a template's alignment bundle and region table and build its
    /// anatomical-space query coordinates.
    pub fn from_config(subject: &Subject, config: &TemplateConfig) -> Result<Self> {
        let grid = GridSpec {
            shape: config.shape,
            affine: Affine::from_rows(config.grid_affine),
        };
        ensure!(!grid.is_empty(), "Template {:?} has an empty grid", config.name);

        let (to_anat, warp) = load_combined(&config.to_anat_affine, &config.warp, &grid.affine)
            .with_context(|| format!("Template {:?}: loading alignment bundle", config.name))?;
        let coords = subject.template_query(&grid, &to_anat, &warp)?;

        let text = std::fs::read_to_string(&config.regions).with_context(|| {
            format!("Failed to read region table {}", config.regions.display())
        })?;
        let regions: RegionTable = serde_json::from_str(&text).with_context(|| {
            format!("Failed to parse region table {}", config.regions.display())
        })?;
        regions.validate(grid.len())?;

        let combos = config
            .tags
            .iter()
            .map(|tag| Combination::decode(&config.name, tag))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: config.name.clone(),
            resolution_mm: config.resolution_mm,
            coords,
            regions,
            combos,
        })
    }

    /// Output space label, e.g. `"mni-2mm"`.
    fn space_label(&self) -> String {
        format!("{}-{}mm", self.name, self.resolution_mm)
    }
}

/// Everything one run's worker needs, shared read-only across runs.
pub struct RunRequest<'a> {
    pub subject_id: &'a str,
    pub output_dir: &'a Path,
    pub subject: &'a Subject,
    pub surface_combos: &'a [Combination],
    pub canonical: Option<&'a CanonicalRequest>,
    pub templates: &'a [TemplateRequest],
    pub spec: SampleSpec,
}

/// `{out}/{space}/{hemi}-cerebrum/{tag}/sub-{sid}_{label}.npy`
fn surface_output(
    output_dir: &Path,
    space: &str,
    hemi: &str,
    tag: &str,
    subject_id: &str,
    label: &str,
) -> PathBuf {
    output_dir
        .join(space)
        .join(format!("{hemi}-cerebrum"))
        .join(tag)
        .join(format!("sub-{subject_id}_{label}.npy"))
}

/// `{out}/canonical/{tag}/sub-{sid}_{label}.npy`
fn canonical_output(output_dir: &Path, tag: &str, subject_id: &str, label: &str) -> PathBuf {
    output_dir
        .join("canonical")
        .join(tag)
        .join(format!("sub-{subject_id}_{label}.npy"))
}

/// `{out}/{space}/{region}/{tag}/sub-{sid}_{label}.npy`
fn template_output(
    output_dir: &Path,
    space_label: &str,
    region: &str,
    tag: &str,
    subject_id: &str,
    label: &str,
) -> PathBuf {
    output_dir
        .join(space_label)
        .join(region)
        .join(tag)
        .join(format!("sub-{subject_id}_{label}.npy"))
}

/// Process one run: compute and write every requested output that does
/// not already exist. Returns the paths written by this invocation.
pub fn workflow_single_run(
    request: &RunRequest<'_>,
    label: &str,
    run_dir: &Path,
) -> Result<Vec<PathBuf>> {
    // Gather pending work before touching any run data.
    let mut surface_pending = Vec::new();
    for combo in request.surface_combos {
        for hemi in request.subject.hemisphere_labels() {
            let path = surface_output(
                request.output_dir,
                &combo.space,
                hemi,
                &combo.tag(),
                request.subject_id,
                label,
            );
            if !path.exists() {
                surface_pending.push((combo, hemi, path));
            }
        }
    }

    let mut canonical_pending = Vec::new();
    if let Some(canonical) = request.canonical {
        for combo in &canonical.combos {
            let path = canonical_output(
                request.output_dir,
                &combo.tag(),
                request.subject_id,
                label,
            );
            if !path.exists() {
                canonical_pending.push((canonical, combo, path));
            }
        }
    }

    let mut template_pending = Vec::new();
    for template in request.templates {
        let space_label = template.space_label();
        for combo in &template.combos {
            let missing: Vec<(String, PathBuf)> = template
                .regions
                .keys()
                .filter_map(|region| {
                    let path = template_output(
                        request.output_dir,
                        &space_label,
                        region,
                        &combo.tag(),
                        request.subject_id,
                        label,
                    );
                    (!path.exists()).then(|| (region.to_string(), path))
                })
                .collect();
            if !missing.is_empty() {
                template_pending.push((template, combo, missing));
            }
        }
    }

    if surface_pending.is_empty() && canonical_pending.is_empty() && template_pending.is_empty() {
        info!(run = label, "all outputs exist, skipping");
        return Ok(Vec::new());
    }

    let run = FunctionalRun::from_workflow_dir(run_dir, label)?;
    let mut written = Vec::new();

    for (combo, hemi, path) in surface_pending {
        let (coords, callback) = request.subject.surface_query(hemi, combo)?;
        let strategy = if combo.one_step {
            Strategy::OneStep
        } else {
            Strategy::TwoStep
        };
        let result = run.resample(strategy, &coords, &request.spec, Some(&*callback))?;
        match result {
            RunResult::Stacked(array) => {
                write_npy(&path, &array)?;
                written.push(path);
            }
            RunResult::Grouped(_) => bail!(
                "Surface combination {} produced a region-grouped result",
                combo.tag()
            ),
        }
    }

    for (canonical, combo, path) in canonical_pending {
        let strategy = if combo.one_step {
            Strategy::OneStep
        } else {
            Strategy::TwoStep
        };
        let result = run.resample(strategy, &canonical.coords, &request.spec, None)?;
        match result {
            RunResult::Stacked(array) => {
                write_npy(&path, &array)?;
                written.push(path);
            }
            RunResult::Grouped(_) => bail!(
                "Canonical combination {} produced a region-grouped result",
                combo.tag()
            ),
        }
    }

    for (template, combo, missing) in template_pending {
        let callback = template.regions.callback();
        let strategy = if combo.one_step {
            Strategy::OneStep
        } else {
            Strategy::TwoStep
        };
        let result = run.resample(strategy, &template.coords, &request.spec, Some(&callback))?;
        match result {
            RunResult::Grouped(regions) => {
                for (region, path) in missing {
                    let array = regions.get(&region).ok_or_else(|| {
                        anyhow!("Region {region:?} missing from grouped result")
                    })?;
                    write_npy(&path, array)?;
                    written.push(path);
                }
            }
            RunResult::Stacked(_) => bail!(
                "Template {} produced an ungrouped result",
                template.space_label()
            ),
        }
    }

    info!(run = label, files = written.len(), "run outputs written");
    Ok(written)
}

/// Run the full workflow: load subject state once, then process every
/// run in parallel. One run's failure is logged and does not stop the
/// other runs; the workflow fails afterwards if any run failed.
pub fn resample_workflow(config: &WorkflowConfig) -> Result<Vec<PathBuf>> {
    let spec = config.sample_spec();

    let rigid = load_rigid(&config.rigid)
        .with_context(|| format!("Loading rigid transform {}", config.rigid.display()))?;
    let mut subject = Subject::new(rigid);
    for surface in &config.surfaces {
        subject.add_hemisphere(surface.hemisphere.clone(), Box::new(FileSurface::new(&surface.dir)));
    }

    let surface_combos = config.surface_combinations()?;
    let canonical = config
        .canonical
        .as_ref()
        .map(|c| CanonicalRequest::from_config(&mut subject, c))
        .transpose()?;
    let templates = config
        .templates
        .iter()
        .map(|t| TemplateRequest::from_config(&subject, t))
        .collect::<Result<Vec<_>>>()?;

    info!(
        subject = %config.subject,
        runs = config.runs.len(),
        surface_combinations = surface_combos.len(),
        templates = templates.len(),
        "starting resampling workflow"
    );

    let request = RunRequest {
        subject_id: &config.subject,
        output_dir: &config.output_dir,
        subject: &subject,
        surface_combos: &surface_combos,
        canonical: canonical.as_ref(),
        templates: &templates,
        spec,
    };

    let process = || {
        config
            .runs
            .par_iter()
            .map(|run| (run.label.clone(), workflow_single_run(&request, &run.label, &run.dir)))
            .collect::<Vec<_>>()
    };
    let outcomes = match config.jobs {
        Some(jobs) => rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("Failed to build worker pool")?
            .install(process),
        None => process(),
    };

    let mut written = Vec::new();
    let mut failures = 0usize;
    for (label, outcome) in outcomes {
        match outcome {
            Ok(paths) => written.extend(paths),
            Err(err) => {
                failures += 1;
                warn!(run = %label, error = %format!("{err:#}"), "run failed");
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} runs failed", config.runs.len());
    }
    Ok(written)
}
