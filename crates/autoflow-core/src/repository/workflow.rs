//! Workflow repository trait definition.
//!
//! Defines the storage interface for workflow definitions and their
//! executions. The infrastructure layer (autoflow-infra) implements this
//! trait with SQLite persistence.

use autoflow_types::error::RepositoryError;
use autoflow_types::execution::{ExecutionStatus, WorkflowExecution};
use autoflow_types::workflow::{Workflow, WorkflowStats, WorkflowStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Repository trait for workflow persistence.
///
/// Covers two entity families:
/// - **Workflows:** CRUD, due-for-cron queries, counters and `next_run`.
/// - **Executions:** creation, guarded status transitions, log appends,
///   queries and retention pruning.
///
/// Every method is one unit of work; no transaction spans several calls.
/// Lists are ordered by creation time descending.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Workflows
    // -----------------------------------------------------------------------

    /// Insert a new workflow.
    fn create_workflow(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a workflow by its UUID.
    fn get_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// List workflows with pagination, optionally filtered by status.
    fn list_workflows(
        &self,
        skip: u32,
        limit: u32,
        status: Option<WorkflowStatus>,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    /// Persist the administrative fields of an existing workflow
    /// (name, description, config, triggers, cron, status, enabled).
    /// Counters are left alone.
    fn update_workflow(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a workflow and, by cascade, its executions. Returns `true` if
    /// it existed.
    fn delete_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Active, enabled workflows with a cron expression whose `next_run` is
    /// unset or not after `now`.
    fn list_due_workflows(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    /// All active, enabled workflows (file-event matching).
    fn list_runnable_workflows(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    /// IDs of every workflow (retention sweep).
    fn list_workflow_ids(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Uuid>, RepositoryError>> + Send;

    fn set_next_run(
        &self,
        id: &Uuid,
        next_run: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Atomically bump `execution_count` plus `success_count` or
    /// `failure_count`, and set `last_execution_at`.
    fn record_execution_outcome(
        &self,
        id: &Uuid,
        success: bool,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn workflow_stats(
        &self,
        since: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<WorkflowStats, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    /// Insert a new (PENDING) execution.
    fn create_execution(
        &self,
        execution: &WorkflowExecution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_execution(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowExecution>, RepositoryError>> + Send;

    /// List executions with pagination, optionally scoped to one workflow
    /// and filtered by status.
    fn list_executions(
        &self,
        workflow_id: Option<&Uuid>,
        skip: u32,
        limit: u32,
        status: Option<ExecutionStatus>,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowExecution>, RepositoryError>> + Send;

    /// Whether any execution of the workflow is currently RUNNING.
    fn has_running_execution(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// PENDING -> RUNNING: sets `started_at` and resets the log to `log`.
    /// Returns `false` if the execution was not PENDING.
    fn mark_execution_running(
        &self,
        id: &Uuid,
        started_at: DateTime<Utc>,
        log: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Append text to the execution log.
    fn append_execution_log(
        &self,
        id: &Uuid,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// RUNNING -> COMPLETED. Returns `false` if the execution was not RUNNING.
    fn complete_execution(
        &self,
        id: &Uuid,
        result: &Value,
        completed_at: DateTime<Utc>,
        duration: f64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// RUNNING -> FAILED. Returns `false` if the execution was not RUNNING.
    fn fail_execution(
        &self,
        id: &Uuid,
        error: &str,
        completed_at: DateTime<Utc>,
        duration: f64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// PENDING or RUNNING -> CANCELLED. Returns `false` if the execution
    /// was already terminal.
    fn cancel_execution(
        &self,
        id: &Uuid,
        completed_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Mark every RUNNING execution of a workflow CANCELLED. Returns how many
    /// rows changed.
    fn cancel_running_executions(
        &self,
        workflow_id: &Uuid,
        completed_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Mark every PENDING or RUNNING execution CANCELLED, across all
    /// workflows. Only valid while no run task owns any of them (startup).
    fn cancel_interrupted_executions(
        &self,
        completed_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Delete terminal executions of a workflow that fall outside its `keep`
    /// most recent executions (any status). Returns how many were deleted.
    fn prune_executions(
        &self,
        workflow_id: &Uuid,
        keep: u32,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
