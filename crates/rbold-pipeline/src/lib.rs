//! Pipeline layer for rbold.
//!
//! Assembles per-subject and per-run state from the IO layer, decodes
//! requested output combinations, and drives the core resampler through
//! an idempotent, parallel run orchestrator.

pub mod combos;
pub mod config;
pub mod orchestrate;
pub mod region;
pub mod run;
pub mod subject;
pub mod surface;

pub use combos::Combination;
pub use config::WorkflowConfig;
pub use orchestrate::{
    resample_workflow, workflow_single_run, CanonicalRequest, RunRequest, TemplateRequest,
};
pub use region::RegionTable;
pub use run::{FunctionalRun, PrealignedSeries, Strategy};
pub use subject::{GridSpec, Subject, SurfaceSpace};
pub use surface::FileSurface;
