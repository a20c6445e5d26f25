//! Notify-based watch source for a single directory

use crate::ignore::IgnoreRules;
use crate::{Error, EventKind, Result, WatchEvent};
use notify::event::{AccessKind, AccessMode, CreateKind, MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

/// Live watch on one directory (non-recursive)
///
/// Events are translated, filtered through the ignore rules and sent on the
/// channel from notify's background thread. Dropping the source stops the
/// watch.
pub struct WatchSource {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
}

impl WatchSource {
    /// Start watching `dir`
    pub fn start(
        dir: &Path,
        ignore: Arc<IgnoreRules>,
        events_tx: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::NotADirectory(dir.to_path_buf()));
        }

        let handler = move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                for watch_event in translate(&event) {
                    if ignore.should_ignore(&watch_event.path) {
                        trace!(path = %watch_event.path.display(), "Ignoring event");
                        continue;
                    }
                    // Subdirectories are not processed
                    if watch_event.kind.feeds_pipeline() && watch_event.path.is_dir() {
                        continue;
                    }
                    if events_tx.send(watch_event).is_err() {
                        debug!("Watch event receiver dropped");
                        return;
                    }
                }
            }
            Err(e) => {
                error!("File system watching may no longer be active: {}", e);
            }
        };

        let mut watcher = notify::recommended_watcher(handler)?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        info!("Watching directory {}", dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Translate a notify event into zero or more watch events
///
/// A file that arrives under a new name (rename target) is reported as
/// `Created`; the name it left is `Renamed`. Folder events, access events
/// other than close-after-write, and metadata changes other than mtime are
/// dropped.
pub fn translate(event: &notify::Event) -> Vec<WatchEvent> {
    use notify::EventKind as Kind;

    let each = |kind: EventKind| -> Vec<WatchEvent> {
        event
            .paths
            .iter()
            .map(|p| WatchEvent::new(p.clone(), kind))
            .collect()
    };

    match event.kind {
        Kind::Create(CreateKind::Folder) => vec![],
        Kind::Create(_) => each(EventKind::Created),

        Kind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::To => each(EventKind::Created),
            RenameMode::From => each(EventKind::Renamed),
            RenameMode::Both => {
                let mut events = Vec::with_capacity(2);
                if let Some(from) = event.paths.first() {
                    events.push(WatchEvent::new(from.clone(), EventKind::Renamed));
                }
                if let Some(to) = event.paths.get(1) {
                    events.push(WatchEvent::new(to.clone(), EventKind::Created));
                }
                events
            }
            // Direction unknown (e.g. FSEvents): decide by what is on disk now
            RenameMode::Any | RenameMode::Other => event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() {
                        EventKind::Created
                    } else {
                        EventKind::Renamed
                    };
                    WatchEvent::new(p.clone(), kind)
                })
                .collect(),
        },
        Kind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)) => each(EventKind::Modified),
        Kind::Modify(ModifyKind::Metadata(_)) => vec![],
        Kind::Modify(_) => each(EventKind::Modified),

        Kind::Access(AccessKind::Close(AccessMode::Write)) => each(EventKind::Modified),
        Kind::Access(_) => vec![],

        Kind::Remove(RemoveKind::Folder) => vec![],
        Kind::Remove(_) => each(EventKind::Deleted),

        Kind::Any | Kind::Other => vec![],
    }
}
