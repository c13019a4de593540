//! Workflow service: the administrative surface over workflows and
//! executions.
//!
//! Validates definitions before they reach storage (name, cron expression,
//! step kinds) and delegates run control to the [`ExecutionCoordinator`].

use std::sync::Arc;

use autoflow_types::error::WorkflowError;
use autoflow_types::execution::{ExecutionStatus, WorkflowExecution};
use autoflow_types::workflow::{
    CreateWorkflowRequest, StepSpec, UpdateWorkflowRequest, Workflow, WorkflowConfig,
    WorkflowStats, WorkflowStatus,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{check_limit, parse_status_filter};
use crate::integration::extractor::ContentExtractor;
use crate::integration::record_store::RecordStoreClient;
use crate::repository::file::FileRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::workflow::coordinator::ExecutionCoordinator;
use crate::workflow::cron;

/// Outcome of validating a cron expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CronPreview {
    pub expression: String,
    pub valid: bool,
    pub next_runs: Vec<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Validate an expression and preview its next `count` occurrences.
pub fn preview_cron(expression: &str, count: usize, from: DateTime<Utc>) -> CronPreview {
    if cron::validate(expression) {
        CronPreview {
            expression: expression.to_string(),
            valid: true,
            next_runs: cron::next_n(expression, from, count),
            error: None,
        }
    } else {
        CronPreview {
            expression: expression.to_string(),
            valid: false,
            next_runs: Vec::new(),
            error: Some(format!("invalid cron expression: '{expression}'")),
        }
    }
}

pub struct WorkflowService<W, F, X, C> {
    workflows: Arc<W>,
    coordinator: Arc<ExecutionCoordinator<W, F, X, C>>,
}

impl<W, F, X, C> WorkflowService<W, F, X, C>
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

    // -----------------------------------------------------------------------
    // Workflows
    // -----------------------------------------------------------------------

    pub async fn create(&self, request: CreateWorkflowRequest) -> Result<Workflow, WorkflowError> {
        let mut request = request;
        request.name = validate_name(&request.name)?;
        request.cron_expression = normalize_cron(request.cron_expression)?;
        validate_steps(&request.config)?;

        let workflow = Workflow::new(request);
        self.workflows.create_workflow(&workflow).await?;

        tracing::info!(workflow_id = %workflow.id, name = %workflow.name, "created workflow");
        Ok(workflow)
    }

    pub async fn list(
        &self,
        skip: u32,
        limit: u32,
        status: Option<&str>,
    ) -> Result<Vec<Workflow>, WorkflowError> {
        let limit = check_limit(limit)?;
        let status: Option<WorkflowStatus> = parse_status_filter(status)?;
        Ok(self.workflows.list_workflows(skip, limit, status).await?)
    }

    pub async fn get(&self, id: &Uuid) -> Result<Workflow, WorkflowError> {
        self.workflows
            .get_workflow(id)
            .await?
            .ok_or(WorkflowError::NotFound(*id))
    }

    /// Apply a partial update. An empty cron expression clears the schedule.
    /// `next_run` is left as is.
    pub async fn update(
        &self,
        id: &Uuid,
        request: UpdateWorkflowRequest,
    ) -> Result<Workflow, WorkflowError> {
        let mut workflow = self.get(id).await?;

        if let Some(name) = request.name {
            workflow.name = validate_name(&name)?;
        }
        if let Some(description) = request.description {
            workflow.description = Some(description);
        }
        if let Some(config) = request.config {
            validate_steps(&config)?;
            workflow.config = config;
        }
        if let Some(triggers) = request.triggers {
            workflow.triggers = triggers;
        }
        if let Some(expr) = request.cron_expression {
            workflow.cron_expression = normalize_cron(Some(expr))?;
        }
        if let Some(status) = request.status {
            workflow.status = status
                .parse::<WorkflowStatus>()
                .map_err(WorkflowError::InvalidStatus)?;
        }
        if let Some(enabled) = request.is_enabled {
            workflow.is_enabled = enabled;
        }
        workflow.updated_at = Utc::now();

        self.workflows.update_workflow(&workflow).await?;
        tracing::info!(workflow_id = %workflow.id, "updated workflow");
        Ok(workflow)
    }

    /// Delete a workflow: stop its in-flight runs, mark RUNNING executions
    /// CANCELLED, then remove it together with its executions.
    pub async fn delete(&self, id: &Uuid) -> Result<(), WorkflowError> {
        let workflow = self.get(id).await?;

        let cancelled = self.coordinator.cancel_workflow(&workflow.id).await?;
        if !self.workflows.delete_workflow(&workflow.id).await? {
            return Err(WorkflowError::NotFound(workflow.id));
        }

        tracing::info!(workflow_id = %workflow.id, cancelled, "deleted workflow");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    pub async fn trigger(
        &self,
        id: &Uuid,
        trigger_data: Option<Value>,
    ) -> Result<WorkflowExecution, WorkflowError> {
        self.coordinator.trigger_manual(id, trigger_data).await
    }

    /// List executions, scoped to one workflow when `workflow_id` is given.
    pub async fn executions(
        &self,
        workflow_id: Option<&Uuid>,
        skip: u32,
        limit: u32,
        status: Option<&str>,
    ) -> Result<Vec<WorkflowExecution>, WorkflowError> {
        let limit = check_limit(limit)?;
        let status: Option<ExecutionStatus> = parse_status_filter(status)?;
        if let Some(id) = workflow_id {
            self.get(id).await?;
        }
        Ok(self
            .workflows
            .list_executions(workflow_id, skip, limit, status)
            .await?)
    }

    pub async fn execution(&self, id: &Uuid) -> Result<WorkflowExecution, WorkflowError> {
        self.workflows
            .get_execution(id)
            .await?
            .ok_or(WorkflowError::ExecutionNotFound(*id))
    }

    /// Cancel an execution. Returns whether anything was cancelled.
    pub async fn cancel_execution(&self, id: &Uuid) -> Result<bool, WorkflowError> {
        self.execution(id).await?;
        self.coordinator.cancel(id).await
    }

    pub async fn stats(&self) -> Result<WorkflowStats, WorkflowError> {
        let since = Utc::now() - Duration::hours(24);
        Ok(self.workflows.workflow_stats(since).await?)
    }
}

fn validate_name(name: &str) -> Result<String, WorkflowError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::Validation("name must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// `None` and blank expressions mean "no schedule"; anything else must be a
/// valid 5-field expression.
fn normalize_cron(expr: Option<String>) -> Result<Option<String>, WorkflowError> {
    match expr {
        None => Ok(None),
        Some(e) if e.trim().is_empty() => Ok(None),
        Some(e) => {
            let trimmed = e.trim().to_string();
            if !cron::validate(&trimmed) {
                return Err(WorkflowError::InvalidCron(trimmed));
            }
            Ok(Some(trimmed))
        }
    }
}

fn validate_steps(config: &WorkflowConfig) -> Result<(), WorkflowError> {
    for (index, raw) in config.steps.iter().enumerate() {
        StepSpec::decode(raw)
            .map_err(|e| WorkflowError::Validation(format!("step {}: {e}", index + 1)))?;
    }
    Ok(())
}
