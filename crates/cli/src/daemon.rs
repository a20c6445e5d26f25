//! Watch process composition and lifecycle

use crate::locks::WatchLock;
use anyhow::{Context, Result};
use hopper_core::HopperConfig;
use hopper_pipeline::{DispatchStats, Dispatcher, StagePipeline};
use hopper_watcher::{IgnoreRules, IntakeConfig, IntakeQueue, IntakeStats, Reconciler, WatchSource};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Counters reported when the watch stops
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchSummary {
    pub intake: IntakeStats,
    pub dispatch: DispatchStats,
}

/// Watch until `shutdown` resolves
///
/// Owns every component for its whole lifetime: the lock, the watch source
/// and its router, the intake queue drain, the reconciler and the
/// dispatcher. On shutdown, pending paths are evicted (with warnings) and
/// runs already started are allowed to finish.
pub async fn run(mut config: HopperConfig, shutdown: impl Future<Output = ()>) -> Result<WatchSummary> {
    config.validate()?;

    let dir = config.watched_directory()?;
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Watch directory {} is not accessible", dir.display()))?;
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }
    config.watch.directory = Some(dir.clone());

    let pipeline = Arc::new(StagePipeline::from_config(&config)?);
    let layout = pipeline.layout();
    let _lock = WatchLock::acquire(&layout.state_dir(), &dir)?;

    let leftovers = layout.leftover_in_processing()?;
    if !leftovers.is_empty() {
        warn!(
            "{} file(s) left in {} by an earlier run will not be processed: {}",
            leftovers.len(),
            layout.processing_dir().display(),
            leftovers
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    info!("Transformers: {:?}", pipeline.registry());

    let ignore = Arc::new(IgnoreRules::new(&dir, &config.watch.ignore_patterns)?);
    let (queue, ready_rx) = IntakeQueue::new(IntakeConfig::from_watch_config(&config.watch));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Watch first so nothing written during the startup scan is missed
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let source = WatchSource::start(&dir, Arc::clone(&ignore), events_tx)?;

    let router = {
        let queue = queue.clone();
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events_rx.recv() => match event {
                        Some(event) => {
                            if let Some(outcome) = queue.feed(&event) {
                                debug!(path = %event.path.display(), ?outcome, "Queued");
                            }
                        }
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
        })
    };

    let reconciler = Reconciler::new(
        dir.clone(),
        ignore,
        queue.clone(),
        config.watch.rescan_interval(),
    );
    if config.watch.scan_existing {
        let found = reconciler.scan_once()?;
        if found > 0 {
            info!("Queued {} existing file(s)", found);
        }
    }
    let reconcile_task = tokio::spawn(reconciler.run(shutdown_rx.clone()));
    let drain_task = tokio::spawn(queue.clone().run(shutdown_rx.clone()));
    let dispatch_task = tokio::spawn(
        Dispatcher::new(Arc::clone(&pipeline), config.pipeline.max_concurrent_runs)
            .run(ready_rx, shutdown_rx.clone()),
    );

    info!(
        "Watching {} (quiet period {}ms, drain every {}ms)",
        source.dir().display(),
        config.watch.quiet_period_ms,
        config.watch.drain_interval_ms
    );

    shutdown.await;
    info!("Shutting down");

    drop(source);
    let _ = shutdown_tx.send(true);

    router.await.context("Event router panicked")?;
    reconcile_task.await.context("Reconciler panicked")?;
    drain_task.await.context("Intake drain panicked")?;
    let dispatch = dispatch_task.await.context("Dispatcher panicked")?;

    Ok(WatchSummary {
        intake: queue.stats(),
        dispatch,
    })
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
