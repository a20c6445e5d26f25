//! Coalescing intake queue
//!
//! Absorbs a high-frequency, possibly duplicate stream of per-path
//! notifications and emits one [`ReadyEvent`] per path once it has been
//! quiet for the configured period. A sliding expiration per entry plus a
//! single periodic drain gives debounce-with-coalescing without per-path
//! timers.
//!
//! Pending items and the in-flight set share one lock, so `notify` and the
//! drain never interleave for the same path. A path stays in flight for as
//! long as its `ReadyEvent` is alive; notifications arriving meanwhile are
//! tracked but not drained until the event is dropped, which rules out two
//! concurrent runs for the same path.

use crate::debounce::WorkItem;
use crate::{EventKind, WatchEvent};
use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Intake timing and capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeConfig {
    /// A path must go this long without notification before it is ready
    pub quiet_period: Duration,
    /// How often settled paths are drained (must be < quiet_period)
    pub drain_interval: Duration,
    /// Evict the least recently touched path beyond this many pending
    pub max_pending: Option<usize>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_secs(2),
            drain_interval: Duration::from_secs(1),
            max_pending: None,
        }
    }
}

impl IntakeConfig {
    pub fn from_watch_config(config: &hopper_core::WatchConfig) -> Self {
        Self {
            quiet_period: config.quiet_period(),
            drain_interval: config.drain_interval(),
            max_pending: config.max_pending,
        }
    }
}

/// What a call to [`IntakeQueue::notify`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// First notification, a new work item was created
    Tracked,
    /// Existing work item refreshed, its quiet period restarted
    Refreshed,
    /// Path is being processed; tracked for the next cycle
    Deferred,
    /// Empty path or queue closed
    Ignored,
}

/// Why a work item left the queue without being handed off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Removed by an explicit `evict` call
    Explicit,
    /// Pushed out by `max_pending`
    Capacity,
    /// Queue closed while the item was pending
    Shutdown,
    /// Nobody is receiving ready events any more
    ChannelClosed,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            EvictionReason::Explicit => "explicit removal",
            EvictionReason::Capacity => "capacity",
            EvictionReason::Shutdown => "shutdown",
            EvictionReason::ChannelClosed => "ready channel closed",
        };
        f.write_str(reason)
    }
}

/// Counters for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeStats {
    /// Notifications received (including ignored ones)
    pub notified: u64,
    /// Work items created
    pub tracked: u64,
    /// Notifications folded into an existing item
    pub coalesced: u64,
    /// Notifications for a path that was in flight
    pub deferred: u64,
    /// Ready events emitted
    pub ready: u64,
    /// Items that left without being processed
    pub evicted: u64,
}

#[derive(Default)]
struct Counters {
    notified: AtomicU64,
    tracked: AtomicU64,
    coalesced: AtomicU64,
    deferred: AtomicU64,
    ready: AtomicU64,
    evicted: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> IntakeStats {
        IntakeStats {
            notified: self.notified.load(Ordering::Relaxed),
            tracked: self.tracked.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            ready: self.ready.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct State {
    pending: AHashMap<PathBuf, WorkItem>,
    in_flight: AHashSet<PathBuf>,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    config: IntakeConfig,
    ready_tx: mpsc::UnboundedSender<ReadyEvent>,
    counters: Counters,
}

/// A path that has settled and may be processed
///
/// Holding the event keeps the path in flight. Drop it once processing is
/// over to let the queue start a new cycle for the same path.
pub struct ReadyEvent {
    item: WorkItem,
    lease: Lease,
}

impl ReadyEvent {
    pub fn path(&self) -> &Path {
        self.item.path()
    }

    /// Notifications coalesced into this event
    pub fn touches(&self) -> u32 {
        self.item.touches()
    }

    /// Time from first notification to hand-off
    pub fn waited(&self) -> Duration {
        self.lease.emitted_at.saturating_duration_since(self.item.first_seen())
    }
}

impl fmt::Debug for ReadyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyEvent")
            .field("path", &self.item.path())
            .field("touches", &self.item.touches())
            .finish()
    }
}

/// Releases the in-flight mark on drop
struct Lease {
    shared: Weak<Shared>,
    path: PathBuf,
    emitted_at: Instant,
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.state.lock().in_flight.remove(&self.path);
        }
    }
}

/// Coalescing, debouncing intake queue
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct IntakeQueue {
    shared: Arc<Shared>,
}

impl IntakeQueue {
    /// Create a queue and the receiver for its ready events
    pub fn new(config: IntakeConfig) -> (Self, mpsc::UnboundedReceiver<ReadyEvent>) {
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let queue = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                config,
                ready_tx,
                counters: Counters::default(),
            }),
        };
        (queue, ready_rx)
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.shared.config
    }

    /// Insert or refresh the work item for `path`
    pub fn notify(&self, path: impl Into<PathBuf>) -> NotifyOutcome {
        self.notify_at(path.into(), Instant::now())
    }

    /// Route a watch event: creations and modifications are queued, the
    /// rest is only logged
    pub fn feed(&self, event: &WatchEvent) -> Option<NotifyOutcome> {
        if event.kind.feeds_pipeline() {
            return Some(self.notify(event.path.clone()));
        }

        match event.kind {
            EventKind::Deleted => info!(path = %event.path.display(), "File deleted"),
            EventKind::Renamed => info!(path = %event.path.display(), "File renamed"),
            EventKind::Created | EventKind::Modified => {}
        }
        None
    }

    pub(crate) fn notify_at(&self, path: PathBuf, now: Instant) -> NotifyOutcome {
        let counters = &self.shared.counters;
        Counters::bump(&counters.notified);

        if path.as_os_str().is_empty() {
            return NotifyOutcome::Ignored;
        }

        let mut state = self.shared.state.lock();
        if state.closed {
            return NotifyOutcome::Ignored;
        }

        let in_flight = state.in_flight.contains(&path);

        if let Some(item) = state.pending.get_mut(&path) {
            item.touch(now);
            Counters::bump(&counters.coalesced);
            if in_flight {
                Counters::bump(&counters.deferred);
                return NotifyOutcome::Deferred;
            }
            return NotifyOutcome::Refreshed;
        }

        if let Some(max) = self.shared.config.max_pending {
            if state.pending.len() >= max {
                let oldest = state
                    .pending
                    .values()
                    .min_by_key(|item| item.last_touched())
                    .map(|item| item.path().to_path_buf());
                if let Some(oldest) = oldest {
                    if let Some(item) = state.pending.remove(&oldest) {
                        self.record_eviction(&item, EvictionReason::Capacity);
                    }
                }
            }
        }

        debug!(path = %path.display(), "Tracking file");
        state.pending.insert(path.clone(), WorkItem::new(path, now));
        Counters::bump(&counters.tracked);

        if in_flight {
            Counters::bump(&counters.deferred);
            NotifyOutcome::Deferred
        } else {
            NotifyOutcome::Tracked
        }
    }

    /// Hand off every settled path; returns the number of events emitted
    pub fn drain(&self) -> usize {
        self.drain_at(Instant::now())
    }

    pub(crate) fn drain_at(&self, now: Instant) -> usize {
        let quiet_period = self.shared.config.quiet_period;

        let ready: Vec<ReadyEvent> = {
            let mut state = self.shared.state.lock();
            let state = &mut *state;

            let mut settled: Vec<PathBuf> = state
                .pending
                .values()
                .filter(|item| item.is_settled(now, quiet_period))
                .filter(|item| !state.in_flight.contains(item.path()))
                .map(|item| item.path().to_path_buf())
                .collect();
            settled.sort();

            settled
                .into_iter()
                .filter_map(|path| {
                    let item = state.pending.remove(&path)?;
                    state.in_flight.insert(path.clone());
                    Some(ReadyEvent {
                        item,
                        lease: Lease {
                            shared: Arc::downgrade(&self.shared),
                            path,
                            emitted_at: now,
                        },
                    })
                })
                .collect()
        };

        // Sent outside the lock: a rejected event drops its lease, which locks
        let mut emitted = 0;
        for event in ready {
            debug!(
                path = %event.path().display(),
                touches = event.touches(),
                "File settled"
            );
            match self.shared.ready_tx.send(event) {
                Ok(()) => {
                    emitted += 1;
                    Counters::bump(&self.shared.counters.ready);
                }
                Err(mpsc::error::SendError(event)) => {
                    self.record_eviction(&event.item, EvictionReason::ChannelClosed);
                }
            }
        }
        emitted
    }

    /// Remove a pending path without processing it
    pub fn evict(&self, path: &Path) -> Option<WorkItem> {
        let item = self.shared.state.lock().pending.remove(path)?;
        self.record_eviction(&item, EvictionReason::Explicit);
        Some(item)
    }

    /// Stop accepting notifications and evict everything still pending
    pub fn close(&self) -> Vec<WorkItem> {
        let evicted: Vec<WorkItem> = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.pending.drain().map(|(_, item)| item).collect()
        };

        for item in &evicted {
            self.record_eviction(item, EvictionReason::Shutdown);
        }
        evicted
    }

    /// Drive the periodic drain until `shutdown` flips to true
    ///
    /// Pending items are evicted (and logged) on the way out.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.shared.config.drain_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            "Intake queue running (quiet period: {:?}, drain interval: {:?})",
            self.shared.config.quiet_period, self.shared.config.drain_interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.drain();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.close();
    }

    /// Number of paths waiting for their quiet period
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Number of paths whose ready event is still alive
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight.len()
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.shared.state.lock().pending.contains_key(path)
    }

    pub fn is_in_flight(&self, path: &Path) -> bool {
        self.shared.state.lock().in_flight.contains(path)
    }

    pub fn stats(&self) -> IntakeStats {
        self.shared.counters.snapshot()
    }

    fn record_eviction(&self, item: &WorkItem, reason: EvictionReason) {
        Counters::bump(&self.shared.counters.evicted);
        warn!(
            path = %item.path().display(),
            %reason,
            "Work item removed unexpectedly and may not have been processed"
        );
    }
}
