//! Region-keyed extraction over template-grid samples.
//!
//! The mapping from region key to flat voxel indices is injected
//! configuration; anatomical labeling semantics stay outside this crate.
//! Index order must follow the template grid's coordinate ordering
//! (C-order over `(i, j, k)`, `k` fastest, see
//! [`rbold_core::CoordinateSet::voxel_grid`]).

use anyhow::{ensure, Result};
use ndarray::Array1;
use rbold_core::FrameSample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Region key to flat template-grid indices, for one resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionTable {
    regions: BTreeMap<String, Vec<usize>>,
}

impl RegionTable {
    pub fn new(regions: BTreeMap<String, Vec<usize>>) -> Self {
        Self { regions }
    }

    /// Region keys, in deterministic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    /// Check every index against the flat grid length.
    pub fn validate(&self, grid_len: usize) -> Result<()> {
        for (key, indices) in &self.regions {
            ensure!(
                indices.iter().all(|&i| i < grid_len),
                "Region {key:?} indexes past the template grid ({grid_len} voxels)"
            );
        }
        Ok(())
    }

    /// Gather per-region values from a flat grid sample vector.
    ///
    /// Indices must have been validated against the grid length; this is
    /// called per frame on the resampler's hot path.
    pub fn extract(&self, values: &Array1<f64>) -> FrameSample {
        FrameSample::Regions(
            self.regions
                .iter()
                .map(|(key, indices)| {
                    let gathered = indices.iter().map(|&i| values[i]).collect();
                    (key.clone(), Array1::from_vec(gathered))
                })
                .collect(),
        )
    }

    /// A per-frame callback for the core resampler.
    pub fn callback(&self) -> impl Fn(Array1<f64>) -> FrameSample + Sync + '_ {
        move |values| self.extract(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn table() -> RegionTable {
        let mut regions = BTreeMap::new();
        regions.insert("left".to_string(), vec![0, 1]);
        regions.insert("right".to_string(), vec![3]);
        RegionTable::new(regions)
    }

    #[test]
    fn extract_gathers_per_region() {
        let values = array![10.0, 11.0, 12.0, 13.0];
        match table().extract(&values) {
            FrameSample::Regions(map) => {
                assert_eq!(map["left"], array![10.0, 11.0]);
                assert_eq!(map["right"], array![13.0]);
            }
            FrameSample::Values(_) => panic!("expected regions"),
        }
    }

    #[test]
    fn validate_rejects_out_of_range_indices() {
        assert!(table().validate(4).is_ok());
        assert!(table().validate(3).is_err());
    }
}
