//! File system intake for Hopper
//!
//! This crate turns raw file system notifications into a low-frequency
//! stream of "this file has settled" events:
//! - Notify-based watch source for one directory (non-recursive)
//! - Ignore rules for editor temp files and configured patterns
//! - Per-path coalescing with a sliding quiet period
//! - Startup scan and optional periodic rescan

pub mod coalesce;
pub mod debounce;
pub mod ignore;
pub mod reconcile;
pub mod source;

pub use crate::coalesce::{
    EvictionReason, IntakeConfig, IntakeQueue, IntakeStats, NotifyOutcome, ReadyEvent,
};
pub use crate::debounce::WorkItem;
pub use crate::ignore::IgnoreRules;
pub use crate::reconcile::Reconciler;
pub use crate::source::WatchSource;

use std::path::PathBuf;
use thiserror::Error;

/// Errors from setting up the intake side
#[derive(Error, Debug)]
pub enum Error {
    /// The notify backend failed
    #[error("File watching error: {0}")]
    Watch(#[from] notify::Error),

    /// An ignore pattern could not be compiled
    #[error("Ignore pattern error: {0}")]
    Pattern(#[from] ::ignore::Error),

    /// IO error while scanning
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The watched path is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Result type for intake operations
pub type Result<T> = std::result::Result<T, Error>;

/// File system event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: EventKind,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: EventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// File created (or moved in under this name)
    Created,
    /// File contents or metadata modified
    Modified,
    /// File deleted
    Deleted,
    /// File renamed away from this name
    Renamed,
}

impl EventKind {
    /// Whether this kind of change should queue the path for processing
    pub fn feeds_pipeline(self) -> bool {
        matches!(self, EventKind::Created | EventKind::Modified)
    }
}
