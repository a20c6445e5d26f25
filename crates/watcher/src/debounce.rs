//! Per-path debouncing state
//!
//! A `WorkItem` tracks one path between its first notification and the
//! moment it has been quiet long enough to process.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

/// One path waiting for its quiet period to elapse
#[derive(Debug, Clone)]
pub struct WorkItem {
    path: PathBuf,
    first_seen: Instant,
    last_touched: Instant,
    touches: u32,
}

impl WorkItem {
    /// Start tracking a path
    pub fn new(path: PathBuf, now: Instant) -> Self {
        Self {
            path,
            first_seen: now,
            last_touched: now,
            touches: 1,
        }
    }

    /// Record another notification, restarting the quiet period
    pub fn touch(&mut self, now: Instant) {
        // Notifications may be stamped out of order across threads
        if now > self.last_touched {
            self.last_touched = now;
        }
        self.touches = self.touches.saturating_add(1);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }

    pub fn first_seen(&self) -> Instant {
        self.first_seen
    }

    pub fn last_touched(&self) -> Instant {
        self.last_touched
    }

    /// Number of notifications coalesced into this item
    pub fn touches(&self) -> u32 {
        self.touches
    }

    /// Earliest instant at which the item counts as settled
    pub fn settles_at(&self, quiet_period: Duration) -> Instant {
        self.last_touched + quiet_period
    }

    /// True once no notification arrived for `quiet_period`
    pub fn is_settled(&self, now: Instant, quiet_period: Duration) -> bool {
        now.saturating_duration_since(self.last_touched) >= quiet_period
    }
}
