//! End-to-end workflow test: one subject, two hemispheres, one run,
//! one surface combination and one template combination, exercised
//! through the public `resample_workflow` entry point.

use anyhow::Result;
use ndarray::{array, Array2, Array3, Array4};
use ndarray_npy::read_npy;
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use rbold_core::Affine;
use rbold_io::write_affines;
use rbold_pipeline::config::{
    CanonicalConfig, RunConfig, SpaceConfig, SurfaceConfig, TemplateConfig,
};
use rbold_pipeline::{resample_workflow, WorkflowConfig};
use std::path::Path;
use tempfile::tempdir;

const N_FRAMES: usize = 4;

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

fn ramp(offset: f64) -> Array3<f64> {
    Array3::from_shape_fn((4, 4, 4), |(i, j, k)| {
        offset + 100.0 * i as f64 + 10.0 * j as f64 + k as f64
    })
}

fn write_run_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir.join("vol"))?;
    write_affines(dir.join("motion.txt"), &vec![Affine::identity(); N_FRAMES])?;
    write_affines(dir.join("registration.txt"), &[Affine::identity()])?;
    for t in 0..N_FRAMES {
        let file = dir.join("vol").join(format!("frame-{t:03}.nii.gz"));
        WriterOptions::new(&file)
            .reference_header(&sform_header(&Affine::identity()))
            .write_nifti(&ramp(1000.0 * t as f64))?;
    }
    Ok(())
}

fn write_surface_dir(dir: &Path, points: Array2<f64>) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    ndarray_npy::write_npy(dir.join("pial_coords.npy"), &points)?;
    // Identity vertex resampling matrix: one sample point per vertex.
    let n = points.nrows();
    ndarray_npy::write_npy(
        dir.join("to-on-avg-1031-final_ico32_area.npy"),
        &Array2::from_shape_fn((n, n), |(r, c)| if r == c { 1.0 } else { 0.0 }),
    )?;
    Ok(())
}

fn write_template_inputs(dir: &Path) -> Result<TemplateConfig> {
    std::fs::create_dir_all(dir)?;
    let affine_path = dir.join("to_anat.txt");
    let warp_path = dir.join("warp.nii");
    let regions_path = dir.join("regions.json");

    write_affines(&affine_path, &[Affine::identity()])?;
    WriterOptions::new(&warp_path)
        .reference_header(&sform_header(&Affine::identity()))
        .write_nifti(&Array4::<f64>::zeros((2, 2, 2, 3)))?;
    // Flat indices into the 2x2x2 grid, k fastest.
    std::fs::write(
        &regions_path,
        r#"{"regions": {"core": [0, 7], "shell": [1]}}"#,
    )?;

    Ok(TemplateConfig {
        name: "mni".to_string(),
        resolution_mm: 2,
        shape: [2, 2, 2],
        grid_affine: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
        to_anat_affine: affine_path,
        warp: warp_path,
        regions: regions_path,
        tags: vec!["1step_linear_overlap".to_string()],
    })
}

fn build_config(root: &Path) -> Result<WorkflowConfig> {
    let run_dir = root.join("run-01");
    write_run_dir(&run_dir)?;

    write_surface_dir(
        &root.join("surf-l"),
        array![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]],
    )?;
    write_surface_dir(&root.join("surf-r"), array![[3.0, 0.0, 1.0]])?;

    let rigid_path = root.join("rigid.txt");
    write_affines(&rigid_path, &[Affine::identity()])?;

    let template = write_template_inputs(&root.join("template"))?;

    Ok(WorkflowConfig {
        subject: "01".to_string(),
        output_dir: root.join("out"),
        rigid: rigid_path,
        runs: vec![RunConfig {
            label: "task-movie_run-01".to_string(),
            dir: run_dir,
        }],
        surfaces: vec![
            SurfaceConfig {
                hemisphere: "l".to_string(),
                dir: root.join("surf-l"),
            },
            SurfaceConfig {
                hemisphere: "r".to_string(),
                dir: root.join("surf-r"),
            },
        ],
        surface_spaces: vec![SpaceConfig {
            space: "onavg-ico32".to_string(),
            tags: vec!["1step_pial_area".to_string()],
        }],
        canonical: Some(CanonicalConfig {
            shape: [2, 2, 2],
            grid_affine: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            tags: vec!["1step_linear_overlap".to_string()],
        }),
        templates: vec![template],
        interpolation: Default::default(),
        fill: None,
        jobs: Some(2),
    })
}

#[test]
fn workflow_writes_every_requested_output_once() -> Result<()> {
    let tmp = tempdir()?;
    let config = build_config(tmp.path())?;

    let written = resample_workflow(&config)?;
    // Two hemispheres, the canonical grid, and two template regions.
    assert_eq!(written.len(), 5);

    let out = config.output_dir.clone();
    let left: Array2<f64> = read_npy(
        out.join("onavg-ico32/l-cerebrum/1step_pial_area/sub-01_task-movie_run-01.npy"),
    )?;
    assert_eq!(left.shape(), &[N_FRAMES, 2]);
    // Vertex (1,1,1) samples 111 in frame 0, 1111 in frame 1, ...
    assert_eq!(left[[0, 0]], 111.0);
    assert_eq!(left[[1, 0]], 1111.0);
    assert_eq!(left[[3, 1]], 3222.0);

    let right: Array2<f64> = read_npy(
        out.join("onavg-ico32/r-cerebrum/1step_pial_area/sub-01_task-movie_run-01.npy"),
    )?;
    assert_eq!(right.shape(), &[N_FRAMES, 1]);
    assert_eq!(right[[0, 0]], 301.0);

    // Canonical grid points are (0,0,0)..(1,1,1), k fastest.
    let canonical: Array2<f64> = read_npy(
        out.join("canonical/1step_linear_overlap/sub-01_task-movie_run-01.npy"),
    )?;
    assert_eq!(canonical.shape(), &[N_FRAMES, 8]);
    assert_eq!(canonical[[0, 0]], 0.0);
    assert_eq!(canonical[[0, 7]], 111.0);
    assert_eq!(canonical[[1, 7]], 1111.0);

    // Template grid points are (0,0,0)..(1,1,1), k fastest; region "core"
    // holds flat indices 0 and 7, i.e. values 0 and 111.
    let core: Array2<f64> = read_npy(
        out.join("mni-2mm/core/1step_linear_overlap/sub-01_task-movie_run-01.npy"),
    )?;
    assert_eq!(core.shape(), &[N_FRAMES, 2]);
    assert_eq!(core[[0, 0]], 0.0);
    assert_eq!(core[[0, 1]], 111.0);
    assert_eq!(core[[2, 1]], 2111.0);

    let shell: Array2<f64> = read_npy(
        out.join("mni-2mm/shell/1step_linear_overlap/sub-01_task-movie_run-01.npy"),
    )?;
    assert_eq!(shell.shape(), &[N_FRAMES, 1]);
    assert_eq!(shell[[0, 0]], 1.0);

    // Existing outputs are the cache: a second invocation writes nothing.
    let rerun = resample_workflow(&config)?;
    assert!(rerun.is_empty());
    Ok(())
}

#[test]
fn partial_outputs_are_backfilled() -> Result<()> {
    let tmp = tempdir()?;
    let config = build_config(tmp.path())?;

    resample_workflow(&config)?;
    let shell_path = config
        .output_dir
        .join("mni-2mm/shell/1step_linear_overlap/sub-01_task-movie_run-01.npy");
    std::fs::remove_file(&shell_path)?;

    let written = resample_workflow(&config)?;
    assert_eq!(written, vec![shell_path.clone()]);
    assert!(shell_path.exists());
    Ok(())
}

#[test]
fn failing_run_does_not_block_healthy_runs() -> Result<()> {
    let tmp = tempdir()?;
    let mut config = build_config(tmp.path())?;
    config.runs.push(RunConfig {
        label: "task-movie_run-02".to_string(),
        dir: tmp.path().join("missing-run"),
    });

    assert!(resample_workflow(&config).is_err());
    // The healthy run's outputs were still produced.
    assert!(config
        .output_dir
        .join("onavg-ico32/l-cerebrum/1step_pial_area/sub-01_task-movie_run-01.npy")
        .exists());
    Ok(())
}
