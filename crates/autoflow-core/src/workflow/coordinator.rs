//! Execution coordinator.
//!
//! Owns every in-flight run. Each run is a task on the shared runtime paired
//! with a [`CancellationToken`]; the token is registered under the execution
//! ID until the task finishes, whatever the outcome. All spawn, cancel and
//! drain operations go through this type.
//!
//! Run lifecycle:
//!
//! ```text
//! PENDING --(task starts)--> RUNNING --+--> COMPLETED  (counters: +1 total, +1 success)
//!                                      +--> FAILED     (counters: +1 total, +1 failure)
//!                                      +--> CANCELLED  (no counter change)
//! ```
//!
//! Terminal writes only apply to RUNNING rows, so a run that was cancelled
//! concurrently never flips back to COMPLETED or FAILED, and counters are
//! only bumped when the terminal write actually happened.
//!
//! Cancellation only races the step list. Once the steps have finished, the
//! terminal write and the counter update always run to completion. A PENDING
//! execution whose token is cancelled before it starts goes straight to
//! CANCELLED.

use std::sync::Arc;

use autoflow_types::error::WorkflowError;
use autoflow_types::execution::{TriggerKind, WorkflowExecution};
use autoflow_types::file::FileRecord;
use autoflow_types::workflow::{Workflow, WorkflowStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

use super::file_trigger;
use super::step_runner::StepInterpreter;
use crate::integration::extractor::ContentExtractor;
use crate::integration::record_store::RecordStoreClient;
use crate::repository::file::FileRepository;
use crate::repository::workflow::WorkflowRepository;

const STARTED_LOG: &str = "Workflow execution started\n";
const COMPLETED_LOG: &str = "Workflow execution completed successfully\n";

/// Result of asking the coordinator to schedule a cron run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A PENDING execution was created and its task spawned.
    Started(Uuid),
    /// Another execution of the workflow is RUNNING; nothing was created.
    Skipped,
}

/// Registry entry for one in-flight run.
struct InFlight {
    workflow_id: Uuid,
    token: CancellationToken,
}

/// Coordinates run tasks for all workflows.
pub struct ExecutionCoordinator<W, F, X, C> {
    workflows: Arc<W>,
    interpreter: Arc<StepInterpreter<W, F, X, C>>,
    in_flight: Arc<DashMap<Uuid, InFlight>>,
    tracker: TaskTracker,
}

impl<W, F, X, C> ExecutionCoordinator<W, F, X, C>
where
    W: WorkflowRepository + 'static,
    F: FileRepository + 'static,
    X: ContentExtractor + 'static,
    C: RecordStoreClient + 'static,
{
    pub fn new(workflows: Arc<W>, files: Arc<F>, extractor: Arc<X>, records: Arc<C>) -> Self {
        let interpreter = StepInterpreter::new(workflows.clone(), files, extractor, records);
        Self {
            workflows,
            interpreter: Arc::new(interpreter),
            in_flight: Arc::new(DashMap::new()),
            tracker: TaskTracker::new(),
        }
    }

    /// Number of registered in-flight runs.
    pub fn active_count(&self) -> usize {
        self.in_flight.len()
    }

    /// IDs of executions with a registered task.
    pub fn active_executions(&self) -> Vec<Uuid> {
        self.in_flight.iter().map(|entry| *entry.key()).collect()
    }

    // -----------------------------------------------------------------------
    // Starting runs
    // -----------------------------------------------------------------------

    /// Start a cron-triggered run unless one of this workflow's executions
    /// is already RUNNING.
    ///
    /// The check and the insert are separate statements; concurrent
    /// schedulers could both pass the check.
    pub async fn schedule_cron_run(
        &self,
        workflow: &Workflow,
    ) -> Result<ScheduleOutcome, WorkflowError> {
        if self.workflows.has_running_execution(&workflow.id).await? {
            tracing::info!(workflow_id = %workflow.id, "workflow already running, skipping scheduled run");
            return Ok(ScheduleOutcome::Skipped);
        }

        let trigger_data = json!({ "cron_expression": workflow.cron_expression });
        let execution = WorkflowExecution::pending(
            workflow.id,
            TriggerKind::Scheduled,
            Some(trigger_data),
            None,
        );
        self.workflows.create_execution(&execution).await?;
        self.spawn_run(execution.id, workflow.id);

        tracing::info!(
            workflow_id = %workflow.id,
            execution_id = %execution.id,
            "scheduled workflow execution"
        );
        Ok(ScheduleOutcome::Started(execution.id))
    }

    /// Start a manual run. No single-flight check is applied.
    pub async fn trigger_manual(
        &self,
        workflow_id: &Uuid,
        trigger_data: Option<Value>,
    ) -> Result<WorkflowExecution, WorkflowError> {
        let workflow = self
            .workflows
            .get_workflow(workflow_id)
            .await?
            .ok_or(WorkflowError::NotFound(*workflow_id))?;

        if workflow.status != WorkflowStatus::Active {
            return Err(WorkflowError::NotActive(workflow.id));
        }
        if !workflow.is_enabled {
            return Err(WorkflowError::Disabled(workflow.id));
        }

        let execution =
            WorkflowExecution::pending(workflow.id, TriggerKind::Manual, trigger_data, None);
        self.workflows.create_execution(&execution).await?;
        self.spawn_run(execution.id, workflow.id);

        tracing::info!(
            workflow_id = %workflow.id,
            execution_id = %execution.id,
            "manually triggered workflow"
        );
        Ok(execution)
    }

    /// Start a run for a file event. The caller has already matched the
    /// workflow's trigger rules.
    pub async fn trigger_from_file_event(
        &self,
        workflow: &Workflow,
        file: &FileRecord,
        trigger_type: TriggerKind,
    ) -> Result<WorkflowExecution, WorkflowError> {
        let trigger_data = json!({
            "file_id": file.id.to_string(),
            "filename": file.original_filename,
            "file_size": file.file_size,
            "mime_type": file.mime_type,
        });
        let execution = WorkflowExecution::pending(
            workflow.id,
            trigger_type,
            Some(trigger_data),
            Some(file.id),
        );
        self.workflows.create_execution(&execution).await?;
        self.spawn_run(execution.id, workflow.id);

        tracing::info!(
            workflow_id = %workflow.id,
            execution_id = %execution.id,
            file_id = %file.id,
            %trigger_type,
            "file event triggered workflow"
        );
        Ok(execution)
    }

    /// Trigger every active, enabled workflow with a rule matching the event.
    ///
    /// A failure to start one workflow is logged and does not stop the
    /// others. Returns the started executions.
    pub async fn dispatch_file_event(
        &self,
        file: &FileRecord,
        trigger_type: TriggerKind,
    ) -> Result<Vec<WorkflowExecution>, WorkflowError> {
        let candidates = self.workflows.list_runnable_workflows().await?;
        let mut started = Vec::new();

        for workflow in candidates
            .iter()
            .filter(|wf| file_trigger::matching_rule(wf, file, trigger_type).is_some())
        {
            match self
                .trigger_from_file_event(workflow, file, trigger_type)
                .await
            {
                Ok(execution) => started.push(execution),
                Err(e) => {
                    tracing::error!(
                        workflow_id = %workflow.id,
                        file_id = %file.id,
                        error = %e,
                        "failed to trigger workflow for file event"
                    );
                }
            }
        }

        Ok(started)
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    /// Cancel one execution.
    ///
    /// Stops the registered task (if any) and marks the execution CANCELLED
    /// if it is still PENDING or RUNNING. Returns whether either happened.
    pub async fn cancel(&self, execution_id: &Uuid) -> Result<bool, WorkflowError> {
        let stopped = match self.in_flight.remove(execution_id) {
            Some((_, entry)) => {
                entry.token.cancel();
                true
            }
            None => false,
        };

        let marked = self
            .workflows
            .cancel_execution(execution_id, Utc::now())
            .await?;

        if stopped || marked {
            tracing::info!(%execution_id, "execution cancelled");
        }
        Ok(stopped || marked)
    }

    /// Cancel every in-flight run of one workflow and mark its RUNNING
    /// executions CANCELLED. Returns how many executions were marked.
    pub async fn cancel_workflow(&self, workflow_id: &Uuid) -> Result<u64, WorkflowError> {
        let ids: Vec<Uuid> = self
            .in_flight
            .iter()
            .filter(|entry| entry.value().workflow_id == *workflow_id)
            .map(|entry| *entry.key())
            .collect();

        for id in ids {
            if let Some((_, entry)) = self.in_flight.remove(&id) {
                entry.token.cancel();
            }
        }

        Ok(self
            .workflows
            .cancel_running_executions(workflow_id, Utc::now())
            .await?)
    }

    /// Cancel every registered run and wait for all run tasks to finish.
    ///
    /// Cancelled tasks mark their own execution CANCELLED on the way out;
    /// storage errors there are logged only.
    pub async fn drain_all(&self) {
        let count = self.in_flight.len();
        for entry in self.in_flight.iter() {
            entry.value().token.cancel();
        }

        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();

        if count > 0 {
            tracing::info!(count, "drained in-flight executions");
        }
    }

    /// Wait for every spawned run to finish on its own.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Mark executions a previous process left PENDING or RUNNING as
    /// CANCELLED. Must run before this coordinator spawns anything.
    pub async fn recover_interrupted(&self) -> Result<u64, WorkflowError> {
        let recovered = self
            .workflows
            .cancel_interrupted_executions(Utc::now())
            .await?;
        if recovered > 0 {
            tracing::warn!(recovered, "cancelled executions interrupted by a previous shutdown");
        }
        Ok(recovered)
    }

    // -----------------------------------------------------------------------
    // Run task
    // -----------------------------------------------------------------------

    fn spawn_run(&self, execution_id: Uuid, workflow_id: Uuid) {
        let token = CancellationToken::new();
        self.in_flight.insert(
            execution_id,
            InFlight {
                workflow_id,
                token: token.clone(),
            },
        );

        let workflows = self.workflows.clone();
        let interpreter = self.interpreter.clone();
        let in_flight = self.in_flight.clone();

        let span = tracing::info_span!("workflow_execution", %execution_id, %workflow_id);

        self.tracker.spawn(
            async move {
                drive_execution(
                    workflows.as_ref(),
                    interpreter.as_ref(),
                    &execution_id,
                    &token,
                )
                .await;
                in_flight.remove(&execution_id);
            }
            .instrument(span),
        );
    }
}

async fn mark_cancelled<W: WorkflowRepository>(workflows: &W, execution_id: &Uuid) {
    match workflows.cancel_execution(execution_id, Utc::now()).await {
        Ok(true) => tracing::info!(%execution_id, "execution cancelled"),
        Ok(false) => {}
        Err(e) => tracing::warn!(%execution_id, error = %e, "failed to mark execution cancelled"),
    }
}

fn duration_secs(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> f64 {
    (completed_at - started_at).num_milliseconds() as f64 / 1000.0
}

/// Move one PENDING execution through RUNNING to a terminal state.
async fn drive_execution<W, F, X, C>(
    workflows: &W,
    interpreter: &StepInterpreter<W, F, X, C>,
    execution_id: &Uuid,
    token: &CancellationToken,
) where
    W: WorkflowRepository,
    F: FileRepository,
    X: ContentExtractor,
    C: RecordStoreClient,
{
    if let Err(e) = try_drive_execution(workflows, interpreter, execution_id, token).await {
        tracing::error!(%execution_id, error = %e, "error executing workflow execution");
    }
}

async fn try_drive_execution<W, F, X, C>(
    workflows: &W,
    interpreter: &StepInterpreter<W, F, X, C>,
    execution_id: &Uuid,
    token: &CancellationToken,
) -> Result<(), WorkflowError>
where
    W: WorkflowRepository,
    F: FileRepository,
    X: ContentExtractor,
    C: RecordStoreClient,
{
    if token.is_cancelled() {
        mark_cancelled(workflows, execution_id).await;
        return Ok(());
    }

    let mut execution = workflows
        .get_execution(execution_id)
        .await?
        .ok_or(WorkflowError::ExecutionNotFound(*execution_id))?;
    let workflow = workflows
        .get_workflow(&execution.workflow_id)
        .await?
        .ok_or(WorkflowError::NotFound(execution.workflow_id))?;

    if token.is_cancelled() {
        mark_cancelled(workflows, execution_id).await;
        return Ok(());
    }

    let started_at = Utc::now();
    if !workflows
        .mark_execution_running(execution_id, started_at, STARTED_LOG)
        .await?
    {
        tracing::warn!(%execution_id, status = %execution.status, "execution not pending, not starting");
        return Ok(());
    }
    execution.started_at = Some(started_at);
    tracing::info!(%execution_id, workflow_id = %workflow.id, "starting execution");

    // From here on every path ends in a terminal write attempt.
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => {
            mark_cancelled(workflows, execution_id).await;
            return Ok(());
        }
        outcome = interpreter.run(&workflow, &execution) => outcome,
    };

    match outcome {
        Ok(result) => {
            let completed_at = Utc::now();
            append_log_best_effort(workflows, execution_id, COMPLETED_LOG).await;
            let duration = duration_secs(started_at, completed_at);
            match workflows
                .complete_execution(execution_id, &result, completed_at, duration)
                .await
            {
                Ok(true) => {
                    record_outcome(workflows, &workflow.id, true, completed_at).await;
                    tracing::info!(%execution_id, workflow_id = %workflow.id, duration, "completed execution");
                }
                Ok(false) => {}
                Err(e) => {
                    let message = format!("failed to store execution result: {e}");
                    fail_run(workflows, &workflow.id, execution_id, started_at, &message).await;
                }
            }
        }
        Err(e) => {
            fail_run(workflows, &workflow.id, execution_id, started_at, &e.to_string()).await;
        }
    }

    Ok(())
}

/// RUNNING -> FAILED with counters. Storage errors are logged; there is no
/// further fallback.
async fn fail_run<W: WorkflowRepository>(
    workflows: &W,
    workflow_id: &Uuid,
    execution_id: &Uuid,
    started_at: DateTime<Utc>,
    message: &str,
) {
    let completed_at = Utc::now();
    append_log_best_effort(
        workflows,
        execution_id,
        &format!("Workflow execution failed: {message}\n"),
    )
    .await;
    let duration = duration_secs(started_at, completed_at);
    match workflows
        .fail_execution(execution_id, message, completed_at, duration)
        .await
    {
        Ok(true) => {
            record_outcome(workflows, workflow_id, false, completed_at).await;
            tracing::error!(%execution_id, %workflow_id, error = %message, "failed execution");
        }
        Ok(false) => {}
        Err(e) => {
            tracing::error!(%execution_id, error = %e, "failed to mark execution failed");
        }
    }
}

async fn append_log_best_effort<W: WorkflowRepository>(
    workflows: &W,
    execution_id: &Uuid,
    text: &str,
) {
    if let Err(e) = workflows.append_execution_log(execution_id, text).await {
        tracing::warn!(%execution_id, error = %e, "failed to append execution log");
    }
}

async fn record_outcome<W: WorkflowRepository>(
    workflows: &W,
    workflow_id: &Uuid,
    success: bool,
    at: DateTime<Utc>,
) {
    if let Err(e) = workflows.record_execution_outcome(workflow_id, success, at).await {
        tracing::error!(%workflow_id, error = %e, "failed to update workflow counters");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        TestCoordinator, memory_coordinator, sample_file, wait_for_terminal, workflow_with_steps,
    };
    use autoflow_types::execution::ExecutionStatus;
    use autoflow_types::workflow::TriggerRule;
    use std::time::Duration;

    async fn setup(steps: Vec<Value>) -> (TestCoordinator, Workflow) {
        let coord = memory_coordinator();
        let workflow = workflow_with_steps(steps);
        coord.workflows.create_workflow(&workflow).await.unwrap();
        (coord, workflow)
    }

    #[tokio::test]
    async fn test_manual_run_completes_and_counts() {
        let (coord, workflow) = setup(vec![json!({"type": "log", "message": "hi"})]).await;
        let exec = coord
            .coordinator
            .trigger_manual(&workflow.id, None)
            .await
            .unwrap();
        assert_eq!(exec.trigger_type, TriggerKind::Manual);
        assert_eq!(exec.trigger_data, json!({}));

        let done = wait_for_terminal(&coord.workflows, &exec.id).await;
        assert_eq!(done.status, ExecutionStatus::Completed);
        assert!(done.duration.is_some());
        assert!(done.logs.starts_with("Workflow execution started\n"));
        assert!(done.logs.ends_with("Workflow execution completed successfully\n"));
        assert_eq!(done.result.unwrap()["steps_successful"], 1);

        let wf = coord.workflows.get_workflow(&workflow.id).await.unwrap().unwrap();
        assert_eq!(wf.execution_count, 1);
        assert_eq!(wf.success_count, 1);
        assert_eq!(wf.failure_count, 0);
        assert_eq!(wf.last_execution_at, done.completed_at);

        coord.coordinator.drain_all().await;
        assert_eq!(coord.coordinator.active_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_run_counts_failure() {
        let (coord, workflow) = setup(vec![json!({"type": "unknown_kind"})]).await;
        let exec = coord
            .coordinator
            .trigger_manual(&workflow.id, None)
            .await
            .unwrap();

        let done = wait_for_terminal(&coord.workflows, &exec.id).await;
        assert_eq!(done.status, ExecutionStatus::Failed);
        let message = done.error_message.unwrap();
        assert!(message.contains("step 1"));
        assert!(message.contains("unknown_kind"));
        assert!(done.logs.contains("Workflow execution failed:"));

        let wf = coord.workflows.get_workflow(&workflow.id).await.unwrap().unwrap();
        assert_eq!(wf.execution_count, 1);
        assert_eq!(wf.failure_count, 1);
        assert_eq!(wf.success_count, 0);
    }

    #[tokio::test]
    async fn test_continue_on_error_run_completes() {
        let (coord, workflow) = setup(vec![
            json!({"type": "unknown_kind", "continue_on_error": true}),
            json!({"type": "log", "message": "ok"}),
        ])
        .await;
        let exec = coord
            .coordinator
            .trigger_manual(&workflow.id, None)
            .await
            .unwrap();

        let done = wait_for_terminal(&coord.workflows, &exec.id).await;
        assert_eq!(done.status, ExecutionStatus::Completed);
        let result = done.result.unwrap();
        assert_eq!(result["steps_failed"], 1);
        assert_eq!(result["steps_executed"], 2);
        assert_eq!(result["results"][1]["result"]["message"], "ok");
    }

    #[tokio::test]
    async fn test_manual_trigger_rejects_inactive() {
        let (coord, mut workflow) = setup(vec![]).await;
        workflow.status = WorkflowStatus::Inactive;
        coord.workflows.update_workflow(&workflow).await.unwrap();

        let err = coord
            .coordinator
            .trigger_manual(&workflow.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotActive(id) if id == workflow.id));

        let execs = coord
            .workflows
            .list_executions(Some(&workflow.id), 0, 100, None)
            .await
            .unwrap();
        assert!(execs.is_empty());
    }

    #[tokio::test]
    async fn test_manual_trigger_rejects_disabled_and_missing() {
        let (coord, mut workflow) = setup(vec![]).await;
        workflow.is_enabled = false;
        coord.workflows.update_workflow(&workflow).await.unwrap();

        let err = coord
            .coordinator
            .trigger_manual(&workflow.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Disabled(_)));

        let err = coord
            .coordinator
            .trigger_manual(&Uuid::now_v7(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cron_run_skipped_while_running() {
        let (coord, workflow) = setup(vec![json!({"type": "delay", "delay": 30})]).await;

        let first = coord.coordinator.schedule_cron_run(&workflow).await.unwrap();
        let ScheduleOutcome::Started(first_id) = first else {
            panic!("first run should start");
        };
        coord.wait_for_status(&first_id, ExecutionStatus::Running).await;

        let second = coord.coordinator.schedule_cron_run(&workflow).await.unwrap();
        assert_eq!(second, ScheduleOutcome::Skipped);

        // Manual triggers are not single-flight.
        let manual = coord.coordinator.trigger_manual(&workflow.id, None).await;
        assert!(manual.is_ok());

        coord.coordinator.drain_all().await;
    }

    #[tokio::test]
    async fn test_cron_run_records_expression() {
        let (coord, mut workflow) = setup(vec![json!({"type": "log"})]).await;
        workflow.cron_expression = Some("*/5 * * * *".to_string());

        let ScheduleOutcome::Started(id) =
            coord.coordinator.schedule_cron_run(&workflow).await.unwrap()
        else {
            panic!("run should start");
        };
        let exec = wait_for_terminal(&coord.workflows, &id).await;
        assert_eq!(exec.trigger_type, TriggerKind::Scheduled);
        assert_eq!(exec.trigger_data, json!({"cron_expression": "*/5 * * * *"}));
    }

    #[tokio::test]
    async fn test_log_store_failure_does_not_strand_run() {
        let (coord, workflow) = setup(vec![json!({"type": "log", "message": "hi"})]).await;
        coord.workflows.fail_on("append_execution_log");

        let exec = coord.coordinator.trigger_manual(&workflow.id, None).await.unwrap();
        let done = wait_for_terminal(&coord.workflows, &exec.id).await;
        assert_eq!(done.status, ExecutionStatus::Completed);

        let wf = coord.workflows.get_workflow(&workflow.id).await.unwrap().unwrap();
        assert_eq!(wf.success_count, 1);
        assert!(!coord.workflows.has_running_execution(&workflow.id).await.unwrap());

        coord.coordinator.wait_idle().await;
        assert_eq!(coord.coordinator.active_count(), 0);
        let next = coord.coordinator.schedule_cron_run(&workflow).await.unwrap();
        assert!(matches!(next, ScheduleOutcome::Started(_)));
        coord.coordinator.wait_idle().await;
    }

    #[tokio::test]
    async fn test_result_store_failure_marks_failed() {
        let (coord, workflow) = setup(vec![json!({"type": "log"})]).await;
        coord.workflows.fail_on("complete_execution");

        let exec = coord.coordinator.trigger_manual(&workflow.id, None).await.unwrap();
        let done = wait_for_terminal(&coord.workflows, &exec.id).await;
        assert_eq!(done.status, ExecutionStatus::Failed);
        assert!(
            done.error_message
                .unwrap()
                .contains("failed to store execution result")
        );

        let wf = coord.workflows.get_workflow(&workflow.id).await.unwrap().unwrap();
        assert_eq!(wf.execution_count, 1);
        assert_eq!(wf.failure_count, 1);
        assert!(!coord.workflows.has_running_execution(&workflow.id).await.unwrap());
        coord.coordinator.wait_idle().await;
    }

    #[tokio::test]
    async fn test_cancel_during_finalization_keeps_counters() {
        let (coord, workflow) = setup(vec![json!({"type": "log"})]).await;
        coord
            .workflows
            .slow_down("record_execution_outcome", Duration::from_millis(200));

        let exec = coord.coordinator.trigger_manual(&workflow.id, None).await.unwrap();
        coord.wait_for_status(&exec.id, ExecutionStatus::Completed).await;
        // The counter update is still in flight.
        coord.coordinator.cancel(&exec.id).await.unwrap();
        coord.coordinator.wait_idle().await;

        let stored = coord.workflows.get_execution(&exec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        let wf = coord.workflows.get_workflow(&workflow.id).await.unwrap().unwrap();
        assert_eq!(wf.execution_count, 1);
        assert_eq!(wf.success_count, 1);
    }

    #[tokio::test]
    async fn test_drain_before_start_cancels_pending() {
        let (coord, workflow) = setup(vec![json!({"type": "log"})]).await;
        let exec = coord.coordinator.trigger_manual(&workflow.id, None).await.unwrap();

        // The run task has not been polled yet on this runtime.
        coord.coordinator.drain_all().await;

        let stored = coord.workflows.get_execution(&exec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Cancelled);
        assert!(stored.started_at.is_none());
        assert!(stored.completed_at.is_some());
        let wf = coord.workflows.get_workflow(&workflow.id).await.unwrap().unwrap();
        assert_eq!(wf.execution_count, 0);
    }

    #[tokio::test]
    async fn test_cancel_running_execution() {
        let (coord, workflow) = setup(vec![json!({"type": "delay", "delay": 30})]).await;
        let exec = coord
            .coordinator
            .trigger_manual(&workflow.id, None)
            .await
            .unwrap();
        coord.wait_for_status(&exec.id, ExecutionStatus::Running).await;

        assert!(coord.coordinator.cancel(&exec.id).await.unwrap());

        let done = wait_for_terminal(&coord.workflows, &exec.id).await;
        assert_eq!(done.status, ExecutionStatus::Cancelled);
        assert!(done.completed_at.is_some());

        // Cancellation is neither success nor failure.
        let wf = coord.workflows.get_workflow(&workflow.id).await.unwrap().unwrap();
        assert_eq!(wf.execution_count, 0);

        // A second cancel finds nothing to do.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!coord.coordinator.cancel(&exec.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_drain_all_cancels_everything() {
        let (coord, workflow) = setup(vec![json!({"type": "delay", "delay": 30})]).await;
        let a = coord.coordinator.trigger_manual(&workflow.id, None).await.unwrap();
        let b = coord.coordinator.trigger_manual(&workflow.id, None).await.unwrap();
        coord.wait_for_status(&a.id, ExecutionStatus::Running).await;
        coord.wait_for_status(&b.id, ExecutionStatus::Running).await;
        assert_eq!(coord.coordinator.active_count(), 2);

        coord.coordinator.drain_all().await;

        assert_eq!(coord.coordinator.active_count(), 0);
        for id in [a.id, b.id] {
            let exec = coord.workflows.get_execution(&id).await.unwrap().unwrap();
            assert_eq!(exec.status, ExecutionStatus::Cancelled);
        }

        // The tracker is reusable after a drain.
        let c = coord.coordinator.trigger_manual(&workflow.id, None).await.unwrap();
        coord.wait_for_status(&c.id, ExecutionStatus::Running).await;
        coord.coordinator.drain_all().await;
    }

    #[tokio::test]
    async fn test_cancel_workflow_marks_running() {
        let (coord, workflow) = setup(vec![json!({"type": "delay", "delay": 30})]).await;
        let exec = coord.coordinator.trigger_manual(&workflow.id, None).await.unwrap();
        coord.wait_for_status(&exec.id, ExecutionStatus::Running).await;

        let marked = coord.coordinator.cancel_workflow(&workflow.id).await.unwrap();
        assert_eq!(marked, 1);
        let done = wait_for_terminal(&coord.workflows, &exec.id).await;
        assert_eq!(done.status, ExecutionStatus::Cancelled);
        coord.coordinator.drain_all().await;
    }

    #[tokio::test]
    async fn test_dispatch_file_event_matches_rules() {
        let coord = memory_coordinator();

        let mut pdf_only = workflow_with_steps(vec![json!({"type": "log"})]);
        pdf_only.triggers = vec![TriggerRule {
            event: "file_upload".to_string(),
            file_extensions: Some(vec![".pdf".to_string()]),
            ..Default::default()
        }];
        let mut txt_rule = workflow_with_steps(vec![json!({"type": "log"})]);
        txt_rule.triggers = vec![TriggerRule {
            event: "file_upload".to_string(),
            file_extensions: Some(vec![".txt".to_string()]),
            ..Default::default()
        }];
        let mut processed_only = workflow_with_steps(vec![json!({"type": "log"})]);
        processed_only.triggers = vec![TriggerRule {
            event: "file_processed".to_string(),
            ..Default::default()
        }];
        for wf in [&pdf_only, &txt_rule, &processed_only] {
            coord.workflows.create_workflow(wf).await.unwrap();
        }

        let file = sample_file("notes.txt");
        let started = coord
            .coordinator
            .dispatch_file_event(&file, TriggerKind::FileUpload)
            .await
            .unwrap();
        assert_eq!(started.len(), 1);
        let exec = &started[0];
        assert_eq!(exec.workflow_id, txt_rule.id);
        assert_eq!(exec.trigger_type, TriggerKind::FileUpload);
        assert_eq!(exec.triggered_file_id, Some(file.id));
        assert_eq!(exec.trigger_data["filename"], "notes.txt");
        assert_eq!(exec.trigger_data["file_size"], file.file_size);

        wait_for_terminal(&coord.workflows, &exec.id).await;
        coord.coordinator.drain_all().await;
    }

    #[tokio::test]
    async fn test_recover_interrupted_cancels_leftovers() {
        let (coord, workflow) = setup(vec![json!({"type": "log"})]).await;
        let pending = WorkflowExecution::pending(workflow.id, TriggerKind::Manual, None, None);
        let mut running = WorkflowExecution::pending(workflow.id, TriggerKind::Scheduled, None, None);
        running.status = ExecutionStatus::Running;
        running.started_at = Some(Utc::now());
        let mut finished = WorkflowExecution::pending(workflow.id, TriggerKind::Manual, None, None);
        finished.status = ExecutionStatus::Completed;
        for e in [&pending, &running, &finished] {
            coord.workflows.create_execution(e).await.unwrap();
        }

        assert_eq!(coord.coordinator.recover_interrupted().await.unwrap(), 2);

        for id in [pending.id, running.id] {
            let stored = coord.workflows.get_execution(&id).await.unwrap().unwrap();
            assert_eq!(stored.status, ExecutionStatus::Cancelled);
            assert!(stored.completed_at.is_some());
        }
        let stored = coord.workflows.get_execution(&finished.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);

        // The cron guard no longer sees a running execution.
        let outcome = coord.coordinator.schedule_cron_run(&workflow).await.unwrap();
        assert!(matches!(outcome, ScheduleOutcome::Started(_)));
        coord.coordinator.wait_idle().await;
    }

    #[tokio::test]
    async fn test_wait_idle_lets_runs_finish() {
        let (coord, workflow) = setup(vec![
            json!({"type": "delay", "delay": 0}),
            json!({"type": "log", "message": "done"}),
        ])
        .await;
        let exec = coord
            .coordinator
            .trigger_manual(&workflow.id, None)
            .await
            .unwrap();

        coord.coordinator.wait_idle().await;

        let stored = coord.workflows.get_execution(&exec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert_eq!(coord.coordinator.active_count(), 0);
    }
}
