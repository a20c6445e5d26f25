//! Startup scan and periodic reconciliation
//!
//! Files already sitting in the watched directory when Hopper starts never
//! produce a notification, and the watcher can miss events (overflow,
//! errors). The reconciler lists the directory and feeds every regular
//! file through the intake queue, once at startup and optionally on an
//! interval.

use crate::coalesce::IntakeQueue;
use crate::ignore::IgnoreRules;
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory scanner feeding the intake queue
pub struct Reconciler {
    /// Watched directory
    dir: PathBuf,

    /// Rules shared with the watch source
    ignore: Arc<IgnoreRules>,

    /// Queue to notify
    queue: IntakeQueue,

    /// Rescan interval (None: startup scan only)
    interval: Option<Duration>,
}

impl Reconciler {
    pub fn new(
        dir: PathBuf,
        ignore: Arc<IgnoreRules>,
        queue: IntakeQueue,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            dir,
            ignore,
            queue,
            interval,
        }
    }

    /// Regular, non-ignored files directly inside the watched directory
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Err(Error::NotADirectory(self.dir.clone()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let entry = entry.map_err(std::io::Error::from)?;

            if !entry.file_type().is_file() {
                continue;
            }
            if self.ignore.should_ignore(entry.path()) {
                continue;
            }
            files.push(entry.into_path());
        }

        files.sort();
        Ok(files)
    }

    /// Notify every file currently present; returns how many were queued
    pub fn scan_once(&self) -> Result<usize> {
        let files = self.list_files()?;
        for path in &files {
            debug!(path = %path.display(), "Found existing file");
            self.queue.notify(path.clone());
        }
        Ok(files.len())
    }

    /// Rescan on the configured interval until `shutdown` flips to true
    ///
    /// Returns immediately when no interval is configured.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let Some(period) = self.interval else {
            return;
        };

        // The startup scan already covered t=0
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Starting periodic rescan (interval: {:?})", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.scan_once() {
                        Ok(0) => debug!("Periodic rescan: directory empty"),
                        Ok(n) => info!("Periodic rescan queued {} files", n),
                        Err(e) => warn!("Periodic rescan failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
