//! Aggregation of per-frame interpolation results.
//!
//! Each frame of a run yields either a plain value array or a mapping from
//! region key to array. Aggregation stacks N frames along a new leading
//! axis, producing one `[N, len]` timeseries array (or one per region
//! key). Mixed variants, mismatched lengths, and mismatched key sets are
//! fatal; there is no partial or lossy fallback.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

use crate::error::{CoreError, Result};

/// The interpolation result of a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameSample {
    /// One value per query coordinate.
    Values(Array1<f64>),
    /// Values split by anatomical region.
    Regions(BTreeMap<String, Array1<f64>>),
}

/// A full run's stacked result, ordered by frame index.
#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    /// `[N_frames, len]` timeseries.
    Stacked(Array2<f64>),
    /// Region key to `[N_frames, len]` timeseries.
    Grouped(BTreeMap<String, Array2<f64>>),
}

/// Stack per-frame samples along a new leading frame axis.
///
/// Frame order in the output follows the input order, which callers must
/// keep equal to acquisition order regardless of how the per-frame work
/// was scheduled.
pub fn stack_frames(frames: Vec<FrameSample>) -> Result<RunResult> {
    let mut iter = frames.into_iter().enumerate();
    let (_, first) = iter.next().ok_or(CoreError::EmptyAggregation)?;

    match first {
        FrameSample::Values(first_values) => {
            let mut rows = vec![first_values];
            for (frame, sample) in iter {
                match sample {
                    FrameSample::Values(values) => {
                        if values.len() != rows[0].len() {
                            return Err(CoreError::ShapeMismatch {
                                expected: vec![rows[0].len()],
                                actual: vec![values.len()],
                            });
                        }
                        rows.push(values);
                    }
                    FrameSample::Regions(_) => {
                        return Err(CoreError::MixedFrameResults { frame });
                    }
                }
            }
            Ok(RunResult::Stacked(stack_rows(rows)))
        }
        FrameSample::Regions(first_regions) => {
            let keys: Vec<String> = first_regions.keys().cloned().collect();
            let mut per_key: BTreeMap<String, Vec<Array1<f64>>> = first_regions
                .into_iter()
                .map(|(k, v)| (k, vec![v]))
                .collect();
            for (frame, sample) in iter {
                match sample {
                    FrameSample::Regions(regions) => {
                        let actual: Vec<String> = regions.keys().cloned().collect();
                        if actual != keys {
                            return Err(CoreError::RegionKeyMismatch {
                                frame,
                                expected: keys,
                                actual,
                            });
                        }
                        for (key, values) in regions {
                            let rows = per_key.get_mut(&key).expect("key checked above");
                            if values.len() != rows[0].len() {
                                return Err(CoreError::ShapeMismatch {
                                    expected: vec![rows[0].len()],
                                    actual: vec![values.len()],
                                });
                            }
                            rows.push(values);
                        }
                    }
                    FrameSample::Values(_) => {
                        return Err(CoreError::MixedFrameResults { frame });
                    }
                }
            }
            Ok(RunResult::Grouped(
                per_key
                    .into_iter()
                    .map(|(key, rows)| (key, stack_rows(rows)))
                    .collect(),
            ))
        }
    }
}

fn stack_rows(rows: Vec<Array1<f64>>) -> Array2<f64> {
    let len = rows[0].len();
    let mut out = Array2::zeros((rows.len(), len));
    for (i, row) in rows.into_iter().enumerate() {
        out.row_mut(i).assign(&row);
    }
    out
}
