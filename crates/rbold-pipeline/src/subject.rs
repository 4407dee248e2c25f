//! Per-subject transform state.
//!
//! A [`Subject`] owns the rigid native-to-anatomical transform and the
//! query coordinate sets derived from it. The rigid transform is loaded
//! once and reused for every surface, canonical, and template query;
//! canonical and template coordinate sets are computed once per subject
//! and shared read-only across all of the subject's runs.

use anyhow::{bail, ensure, Context, Result};
use ndarray::{Array1, Array2, Axis};
use rbold_core::{
    Affine, CoordinateSet, DisplacementField, FrameSample, SampleSpec,
};
use std::collections::BTreeMap;

use crate::combos::Combination;

/// Shape and voxel-to-physical affine of a target grid.
///
/// The template grid is explicit configuration, never ambient state, so
/// tests can swap it per scenario.
#[derive(Debug, Clone)]
pub struct GridSpec {
    pub shape: [usize; 3],
    pub affine: Affine,
}

impl GridSpec {
    /// Number of voxels in the flat grid.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Surface-space capability for one hemisphere.
///
/// The geometric construction of vertex coordinates and vertex resampling
/// matrices is out of scope for rbold; implementations supply them from
/// wherever they live.
pub trait SurfaceSpace: Sync {
    /// Query coordinates in native space for a projection surface.
    ///
    /// May return several sample points per output vertex; the count must
    /// be a whole multiple of the resampling matrix's row count.
    fn coordinates(&self, projection: &str) -> Result<CoordinateSet>;

    /// Vertex resampling matrix `[V, V_out]` for a target space and
    /// resampling method.
    fn resampling_matrix(&self, space: &str, method: &str) -> Result<Array2<f64>>;
}

/// Per-subject transform store.
pub struct Subject {
    rigid: Affine,
    hemispheres: BTreeMap<String, Box<dyn SurfaceSpace>>,
    canonical_coords: Option<CoordinateSet>,
}

impl Subject {
    /// Create a subject from its rigid native-to-anatomical transform.
    pub fn new(rigid: Affine) -> Self {
        Self {
            rigid,
            hemispheres: BTreeMap::new(),
            canonical_coords: None,
        }
    }

    /// The rigid native-to-anatomical transform.
    pub fn rigid(&self) -> &Affine {
        &self.rigid
    }

    /// Attach a hemisphere's surface capability.
    pub fn add_hemisphere(&mut self, label: impl Into<String>, surface: Box<dyn SurfaceSpace>) {
        self.hemispheres.insert(label.into(), surface);
    }

    /// Hemisphere labels, in deterministic order.
    pub fn hemisphere_labels(&self) -> impl Iterator<Item = &str> {
        self.hemispheres.keys().map(String::as_str)
    }

    /// Build the canonical-volume query coordinates: the canonical grid
    /// mapped through its own affine, then the rigid transform.
    pub fn prepare_canonical(&mut self, grid: &GridSpec) {
        let coords = CoordinateSet::voxel_grid(grid.shape, &grid.affine);
        self.canonical_coords = Some(coords.transformed(&self.rigid));
    }

    /// Build one template grid's query coordinates: the template grid
    /// plus the nonlinear displacement, then the template-to-anatomical
    /// affine. Computed per template grid, once per subject.
    pub fn template_query(
        &self,
        grid: &GridSpec,
        template_to_anat: &Affine,
        warp: &DisplacementField,
    ) -> Result<CoordinateSet> {
        let mut coords = CoordinateSet::voxel_grid(grid.shape, &grid.affine);
        let displacement = warp
            .sample(&coords, &SampleSpec::default())
            .context("Failed to sample subject-to-template displacement")?;
        coords.add_displacement(&displacement)?;
        Ok(coords.transformed(template_to_anat))
    }

    /// Canonical-volume query coordinates, if prepared.
    pub fn canonical_coords(&self) -> Option<&CoordinateSet> {
        self.canonical_coords.as_ref()
    }

    /// Assemble the query coordinates and per-frame callback for one
    /// surface combination on one hemisphere.
    ///
    /// The callback mean-pools the projection's sample points per vertex
    /// and applies the vertex resampling matrix.
    pub fn surface_query(
        &self,
        hemi: &str,
        combination: &Combination,
    ) -> Result<(CoordinateSet, Box<dyn Fn(Array1<f64>) -> FrameSample + Sync>)> {
        let surface = match self.hemispheres.get(hemi) {
            Some(surface) => surface,
            None => bail!("Unknown hemisphere {hemi:?}"),
        };
        let coords = surface
            .coordinates(&combination.projection)?
            .transformed(&self.rigid);
        let xform = surface.resampling_matrix(&combination.space, &combination.method)?;

        let vertices = xform.nrows();
        ensure!(
            vertices > 0 && coords.len() % vertices == 0,
            "Surface coordinates ({}) are not a whole multiple of the \
             resampling matrix rows ({vertices})",
            coords.len()
        );
        let samples_per_vertex = coords.len() / vertices;

        let callback = move |values: Array1<f64>| {
            let pooled = Array2::from_shape_vec(
                (vertices, samples_per_vertex),
                values.to_vec(),
            )
            .expect("sample count validated against vertex count")
            .mean_axis(Axis(1))
            .expect("samples_per_vertex is nonzero");
            FrameSample::Values(pooled.dot(&xform))
        };
        Ok((coords, Box::new(callback)))
    }
}
