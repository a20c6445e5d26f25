//! Runs ready files from the intake queue

use crate::report::RunReport;
use crate::stages::StagePipeline;
use hopper_watcher::ReadyEvent;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Outcome counts for one dispatcher lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub archived: u64,
    pub unsupported: u64,
    pub failed: u64,
    /// Ready events received after shutdown began and never run
    pub abandoned: u64,
}

impl DispatchStats {
    pub fn total(&self) -> u64 {
        self.archived + self.unsupported + self.failed
    }

    fn record(&mut self, report: &RunReport) {
        if report.is_archived() {
            self.archived += 1;
        } else if report.is_unsupported() {
            self.unsupported += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Consumes ready events and runs each through the stage pipeline
///
/// Every run executes on the blocking pool so the watch source and drain
/// are never held up; at most `max_concurrent` runs execute at once. The
/// ready event is dropped only after its run finishes, which keeps the path
/// in flight for the whole run.
pub struct Dispatcher {
    pipeline: Arc<StagePipeline>,
    limit: Arc<Semaphore>,
    report_tx: Option<mpsc::UnboundedSender<RunReport>>,
}

impl Dispatcher {
    pub fn new(pipeline: Arc<StagePipeline>, max_concurrent: usize) -> Self {
        Self {
            pipeline,
            limit: Arc::new(Semaphore::new(max_concurrent.max(1))),
            report_tx: None,
        }
    }

    /// Also forward every finished report to `tx`
    pub fn with_report_sink(mut self, tx: mpsc::UnboundedSender<RunReport>) -> Self {
        self.report_tx = Some(tx);
        self
    }

    /// Dispatch until the ready channel closes or `shutdown` flips to true
    ///
    /// Runs already started are awaited before returning.
    pub async fn run(
        self,
        mut ready_rx: mpsc::UnboundedReceiver<ReadyEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> DispatchStats {
        let mut stats = DispatchStats::default();
        let mut tasks: JoinSet<Option<RunReport>> = JoinSet::new();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = ready_rx.recv() => match event {
                    Some(event) => self.spawn_run(&mut tasks, event),
                    None => {
                        debug!("Ready channel closed");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    self.finish(joined, &mut stats);
                }
            }
        }

        ready_rx.close();
        while let Ok(event) = ready_rx.try_recv() {
            warn!(path = %event.path().display(), "Shutting down, file was not processed");
            stats.abandoned += 1;
        }

        if !tasks.is_empty() {
            info!("Waiting for {} running pipeline runs", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            self.finish(joined, &mut stats);
        }

        stats
    }

    fn spawn_run(&self, tasks: &mut JoinSet<Option<RunReport>>, event: ReadyEvent) {
        let pipeline = Arc::clone(&self.pipeline);
        let limit = Arc::clone(&self.limit);

        debug!(
            path = %event.path().display(),
            waited_ms = event.waited().as_millis() as u64,
            "Dispatching"
        );

        tasks.spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else {
                return None;
            };
            let path: PathBuf = event.path().to_path_buf();

            let joined = tokio::task::spawn_blocking(move || {
                let report = pipeline.process(event.path());
                // Frees the path for its next cycle
                drop(event);
                report
            })
            .await;

            match joined {
                Ok(report) => Some(report),
                Err(e) => {
                    error!(path = %path.display(), "Pipeline run aborted: {}", e);
                    None
                }
            }
        });
    }

    fn finish(
        &self,
        joined: Result<Option<RunReport>, tokio::task::JoinError>,
        stats: &mut DispatchStats,
    ) {
        let report = match joined {
            Ok(Some(report)) => report,
            Ok(None) => {
                stats.failed += 1;
                return;
            }
            Err(e) => {
                error!("Dispatch task failed: {}", e);
                stats.failed += 1;
                return;
            }
        };

        report.log();
        stats.record(&report);

        if let Some(tx) = &self.report_tx {
            let _ = tx.send(report);
        }
    }
}
