//! Background scheduler loop.
//!
//! Every interval the loop runs one trigger-detection tick and one retention
//! sweep. Errors from either are logged and the loop carries on; only
//! [`Scheduler::stop`] ends it. Stopping also drains every in-flight run.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::coordinator::ExecutionCoordinator;
use super::detector::TriggerDetector;
use super::retention::RetentionManager;
use crate::integration::extractor::ContentExtractor;
use crate::integration::record_store::RecordStoreClient;
use crate::repository::file::FileRepository;
use crate::repository::workflow::WorkflowRepository;

/// Snapshot reported by [`Scheduler::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub active_executions: usize,
    /// Poll interval in seconds.
    pub scheduler_interval: u64,
}

struct LoopHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Scheduler<W, F, X, C> {
    detector: Arc<TriggerDetector<W, F, X, C>>,
    retention: Arc<RetentionManager<W>>,
    coordinator: Arc<ExecutionCoordinator<W, F, X, C>>,
    interval: Duration,
    state: Mutex<Option<LoopHandle>>,
}

impl<W, F, X, C> Scheduler<W, F, X, C>
where
    W: WorkflowRepository + 'static,
    F: FileRepository + 'static,
    X: ContentExtractor + 'static,
    C: RecordStoreClient + 'static,
{
    pub fn new(
        workflows: Arc<W>,
        coordinator: Arc<ExecutionCoordinator<W, F, X, C>>,
        interval: Duration,
        max_executions: u32,
    ) -> Self {
        Self {
            detector: Arc::new(TriggerDetector::new(workflows.clone(), coordinator.clone())),
            retention: Arc::new(RetentionManager::new(workflows, max_executions)),
            coordinator,
            interval,
            state: Mutex::new(None),
        }
    }

    /// Spawn the loop. A second call while running is a no-op.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if state.is_some() {
            tracing::warn!("scheduler already running");
            return;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.detector.clone(),
            self.retention.clone(),
            self.interval,
            token.clone(),
        ));
        *state = Some(LoopHandle { token, handle });

        tracing::info!(interval_secs = self.interval.as_secs(), "workflow scheduler started");
    }

    /// Stop the loop, wait for it to exit, then drain all in-flight runs.
    pub async fn stop(&self) {
        let handle = self.state.lock().await.take();
        if let Some(LoopHandle { token, handle }) = handle {
            token.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "scheduler loop ended abnormally");
            }
        }

        self.coordinator.drain_all().await;
        tracing::info!("workflow scheduler stopped");
    }

    pub async fn status(&self) -> SchedulerStatus {
        let running = self
            .state
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished());
        SchedulerStatus {
            running,
            active_executions: self.coordinator.active_count(),
            scheduler_interval: self.interval.as_secs(),
        }
    }
}

async fn run_loop<W, F, X, C>(
    detector: Arc<TriggerDetector<W, F, X, C>>,
    retention: Arc<RetentionManager<W>>,
    interval: Duration,
    token: CancellationToken,
) where
    W: WorkflowRepository + 'static,
    F: FileRepository + 'static,
    X: ContentExtractor + 'static,
    C: RecordStoreClient + 'static,
{
    loop {
        if let Err(e) = detector.tick(Utc::now()).await {
            tracing::error!(error = %e, "error in scheduler loop");
        }
        if let Err(e) = retention.sweep().await {
            tracing::error!(error = %e, "error in cleanup loop");
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
