//! Staged file pipeline for Hopper
//!
//! This crate provides:
//! - `PipelineRun`: one file's traversal through the stages
//! - `StagePipeline`: backup -> processing -> transform -> complete -> cleanup
//! - `RunReport`: structured outcome of a run
//! - `Dispatcher`: runs ready files from the intake queue on worker threads

pub mod dispatch;
pub mod report;
pub mod run;
pub mod stages;

// Re-exports
pub use dispatch::{DispatchStats, Dispatcher};
pub use report::{Disposition, RunError, RunReport, Step};
pub use run::{Location, PipelineRun, Stage};
pub use stages::StagePipeline;
