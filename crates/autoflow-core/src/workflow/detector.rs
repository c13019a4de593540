//! Cron trigger detection.
//!
//! One [`TriggerDetector::tick`] finds every due workflow, asks the
//! coordinator to schedule it, and moves its `next_run` to the first cron
//! occurrence after the tick's evaluation instant. `next_run` is advanced even
//! when the single-flight guard skipped the run or scheduling failed, so the
//! workflow waits for its next natural occurrence instead of retrying every
//! tick.

use std::sync::Arc;

use autoflow_types::error::{RepositoryError, WorkflowError};
use autoflow_types::workflow::Workflow;
use chrono::{DateTime, Utc};

use super::coordinator::{ExecutionCoordinator, ScheduleOutcome};
use super::cron;
use crate::integration::extractor::ContentExtractor;
use crate::integration::record_store::RecordStoreClient;
use crate::repository::file::FileRepository;
use crate::repository::workflow::WorkflowRepository;

/// Counts from one detection tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub started: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub struct TriggerDetector<W, F, X, C> {
    workflows: Arc<W>,
    coordinator: Arc<ExecutionCoordinator<W, F, X, C>>,
}

impl<W, F, X, C> TriggerDetector<W, F, X, C>
where
    W: WorkflowRepository + 'static,
    F: FileRepository + 'static,
    X: ContentExtractor + 'static,
    C: RecordStoreClient + 'static,
{
    pub fn new(workflows: Arc<W>, coordinator: Arc<ExecutionCoordinator<W, F, X, C>>) -> Self {
        Self {
            workflows,
            coordinator,
        }
    }

    /// Run one detection pass evaluated at `now`.
    ///
    /// Only the due-workflow query can fail the tick; per-workflow failures
    /// are logged and counted.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, RepositoryError> {
        let due = self.workflows.list_due_workflows(now).await?;
        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };

        for workflow in &due {
            match self.process(workflow, now).await {
                Ok(ScheduleOutcome::Started(_)) => report.started += 1,
                Ok(ScheduleOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(workflow_id = %workflow.id, error = %e, "error processing scheduled workflow");
                }
            }
        }

        if report.due > 0 {
            tracing::debug!(
                due = report.due,
                started = report.started,
                skipped = report.skipped,
                errors = report.errors,
                "trigger detection tick"
            );
        }
        Ok(report)
    }

    async fn process(
        &self,
        workflow: &Workflow,
        now: DateTime<Utc>,
    ) -> Result<ScheduleOutcome, WorkflowError> {
        let Some(expr) = workflow.cron_expression.as_deref() else {
            return Ok(ScheduleOutcome::Skipped);
        };
        // Checked before scheduling so a broken expression never starts runs.
        let next_run =
            cron::next_after(expr, now).map_err(|e| WorkflowError::InvalidCron(e.to_string()))?;

        // Advanced whatever scheduling did, so a failing store is retried at
        // the next occurrence rather than on every tick.
        let scheduled = self.coordinator.schedule_cron_run(workflow).await;
        self.workflows.set_next_run(&workflow.id, Some(next_run)).await?;
        scheduled
    }
}
