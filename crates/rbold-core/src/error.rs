//! Error types for the resampling core.

use thiserror::Error;

/// Main error type for core resampling operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Transform inversion failed outright (LU decomposition found no inverse).
    #[error("Singular transform: {0}")]
    SingularTransform(String),

    /// Transform inverted, but the round-trip residual exceeds the
    /// conditioning tolerance.
    #[error("Ill-conditioned transform: round-trip residual {residual:e} exceeds {tolerance:e}")]
    IllConditionedTransform { residual: f64, tolerance: f64 },

    /// Shape mismatch between related arrays.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A coordinate set without a homogeneous trailing column.
    #[error("Coordinate set is not homogeneous: {0}")]
    NotHomogeneous(String),

    /// Per-volume warp fields that do not match the frame count.
    #[error("Warp field count mismatch: {warps} warp fields for {frames} frames")]
    WarpCountMismatch { warps: usize, frames: usize },

    /// Per-volume motion transforms that do not match the frame count.
    #[error("Motion transform count mismatch: {transforms} transforms for {frames} frames")]
    MotionCountMismatch { transforms: usize, frames: usize },

    /// Frames produced a mix of plain and region-keyed samples.
    #[error("Mixed frame results: frame {frame} does not match the first frame's variant")]
    MixedFrameResults { frame: usize },

    /// Region-keyed frames with differing key sets.
    #[error("Region key mismatch at frame {frame}: expected {expected:?}, got {actual:?}")]
    RegionKeyMismatch {
        frame: usize,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Nothing to aggregate.
    #[error("Cannot aggregate an empty frame list")]
    EmptyAggregation,
}

/// Result type for core resampling operations.
pub type Result<T> = std::result::Result<T, CoreError>;
