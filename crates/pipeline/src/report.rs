//! Run outcomes and errors

use crate::run::{PipelineRun, Stage};
use hopper_core::TransformError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Pipeline step an IO error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Backup,
    Stage,
    Transform,
    Cleanup,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Backup => "backup",
            Step::Stage => "staging",
            Step::Transform => "transform",
            Step::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Why a run ended in `Failed`
///
/// All of these are contained to the one file.
#[derive(Error, Debug)]
pub enum RunError {
    /// File vanished between notification and processing
    #[error("file {0} not found")]
    SourceMissing(PathBuf),

    /// In-progress slot already occupied; the original was left in place
    #[error("{0} is already being processed")]
    NameCollision(PathBuf),

    /// Copy, move, directory creation or delete failed
    #[error("{step} failed for {path}: {source}")]
    Io {
        step: Step,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The transformer rejected the file or failed to write output
    #[error("{transformer} transform failed for {path}: {source}")]
    Transform {
        transformer: &'static str,
        path: PathBuf,
        #[source]
        source: TransformError,
    },

    /// Stage paths could not be derived
    #[error(transparent)]
    Layout(#[from] hopper_core::Error),
}

impl RunError {
    /// Errors that should be structurally impossible
    pub fn is_anomaly(&self) -> bool {
        matches!(self, RunError::NameCollision(_))
    }
}

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Transformed output stored at this path
    Archived(PathBuf),
    /// No transformer for the extension; file left in processing/
    Unsupported { staged_at: PathBuf },
}

/// Structured outcome of one run
#[derive(Debug)]
pub struct RunReport {
    /// Final state of the run
    pub run: PipelineRun,
    pub result: Result<Disposition, RunError>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn stage(&self) -> Stage {
        self.run.stage()
    }

    pub fn is_archived(&self) -> bool {
        matches!(self.result, Ok(Disposition::Archived(_)))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self.result, Ok(Disposition::Unsupported { .. }))
    }

    pub fn is_failed(&self) -> bool {
        self.result.is_err()
    }

    /// Emit the outcome as a log line
    pub fn log(&self) {
        let path = self.run.source_path().display();
        match &self.result {
            Ok(Disposition::Archived(archive)) => info!(
                path = %path,
                archive = %archive.display(),
                elapsed_ms = self.elapsed.as_millis() as u64,
                "Processed file"
            ),
            Ok(Disposition::Unsupported { staged_at }) => info!(
                path = %path,
                staged_at = %staged_at.display(),
                extension = self.run.extension(),
                "Unsupported type, left in processing"
            ),
            Err(e) if e.is_anomaly() => warn!(
                path = %path,
                stage = %self.run.stage(),
                "Anomaly: {}", e
            ),
            Err(e) => error!(
                path = %path,
                stage = %self.run.stage(),
                "Processing failed: {}", e
            ),
        }
    }
}
