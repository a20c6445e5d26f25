//! Pipeline run state

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stage a run has reached
///
/// Each stage is entered once the step leading to it has completed on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Handed off by the intake queue, nothing done yet
    Discovered,
    /// Safety copy written to backup/
    BackedUp,
    /// Moved into processing/
    InProgress,
    /// Transform output written to complete/
    Transformed,
    /// In-progress copy removed, output is the canonical artifact
    Archived,
    /// Stopped on an error
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Archived | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discovered => "discovered",
            Stage::BackedUp => "backed-up",
            Stage::InProgress => "in-progress",
            Stage::Transformed => "transformed",
            Stage::Archived => "archived",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Where the file lives right now
///
/// Exactly one location at a time; the backup is a copy and tracked apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Source(PathBuf),
    InProgress(PathBuf),
    Archived(PathBuf),
}

impl Location {
    pub fn path(&self) -> &Path {
        match self {
            Location::Source(p) | Location::InProgress(p) | Location::Archived(p) => p,
        }
    }
}

/// One file's traversal through the pipeline
#[derive(Debug, Clone)]
pub struct PipelineRun {
    source_path: PathBuf,
    file_name: Option<OsString>,
    extension: String,
    stage: Stage,
    location: Location,
    backup_path: Option<PathBuf>,
}

impl PipelineRun {
    /// Start a run for a path handed off by the intake queue
    pub fn discover(source_path: PathBuf) -> Self {
        let file_name = source_path.file_name().map(OsStr::to_os_string);
        let extension = source_path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            location: Location::Source(source_path.clone()),
            source_path,
            file_name,
            extension,
            stage: Stage::Discovered,
            backup_path: None,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.file_name.as_deref()
    }

    /// Extension without the dot, empty when there is none
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn backup_path(&self) -> Option<&Path> {
        self.backup_path.as_deref()
    }

    pub fn in_progress_path(&self) -> Option<&Path> {
        match &self.location {
            Location::InProgress(p) => Some(p),
            _ => None,
        }
    }

    pub fn archive_path(&self) -> Option<&Path> {
        match &self.location {
            Location::Archived(p) => Some(p),
            _ => None,
        }
    }

    pub(crate) fn backed_up(&mut self, backup: PathBuf) {
        debug_assert_eq!(self.stage, Stage::Discovered);
        self.backup_path = Some(backup);
        self.stage = Stage::BackedUp;
    }

    pub(crate) fn staged(&mut self, in_progress: PathBuf) {
        debug_assert_eq!(self.stage, Stage::BackedUp);
        self.location = Location::InProgress(in_progress);
        self.stage = Stage::InProgress;
    }

    pub(crate) fn transformed(&mut self) {
        debug_assert_eq!(self.stage, Stage::InProgress);
        self.stage = Stage::Transformed;
    }

    pub(crate) fn archived(&mut self, archive: PathBuf) {
        debug_assert_eq!(self.stage, Stage::Transformed);
        self.location = Location::Archived(archive);
        self.stage = Stage::Archived;
    }

    pub(crate) fn fail(&mut self) {
        self.stage = Stage::Failed;
    }
}
