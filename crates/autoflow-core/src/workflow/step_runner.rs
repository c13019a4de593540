//! Step interpreter.
//!
//! Runs a workflow's ordered step list against an [`ExecutionContext`]:
//!
//! - Before each step a progress line is appended to the execution log.
//! - Each raw step is decoded into the closed [`StepKind`] union; unknown
//!   kinds fail that step with [`StepError::UnknownStepType`].
//! - A successful step stores its result as `step_{n}_result` in the context.
//! - A failed step aborts the run unless it sets `continue_on_error`.
//!
//! Steps run strictly in order. The only suspension points are storage
//! calls, collaborator calls and `delay` steps; dropping the future at any
//! of them stops the run.

use std::sync::Arc;
use std::time::Duration;

use autoflow_types::error::RepositoryError;
use autoflow_types::execution::WorkflowExecution;
use autoflow_types::file::FileStatus;
use autoflow_types::workflow::{ConditionSpec, StepDecodeError, StepKind, StepSpec, Workflow};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::context::{ExecutionContext, stringify};
use crate::integration::extractor::ContentExtractor;
use crate::integration::record_store::{RecordStoreClient, RecordStoreError};
use crate::repository::file::FileRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::service::file::process_file_content;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("unknown step type: {0}")]
    UnknownStepType(String),

    #[error("{0}")]
    InvalidStep(String),

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("file {0} not found")]
    FileNotFound(Uuid),

    #[error(transparent)]
    RecordStore(#[from] RecordStoreError),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl From<StepDecodeError> for StepError {
    fn from(e: StepDecodeError) -> Self {
        match e {
            StepDecodeError::UnknownType(kind) => StepError::UnknownStepType(kind),
            other => StepError::InvalidStep(other.to_string()),
        }
    }
}

/// Failure of a whole step list.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A step without `continue_on_error` failed. `step` is 1-based.
    #[error("workflow stopped at step {step}: {source}")]
    Stopped {
        step: usize,
        #[source]
        source: StepError,
    },

    /// Storage failed outside any step (seeding the context).
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

// ---------------------------------------------------------------------------
// StepInterpreter
// ---------------------------------------------------------------------------

/// Executes step lists. Shared by every run of the coordinator.
pub struct StepInterpreter<W, F, X, C> {
    workflows: Arc<W>,
    files: Arc<F>,
    extractor: Arc<X>,
    records: Arc<C>,
}

impl<W, F, X, C> StepInterpreter<W, F, X, C>
where
    W: WorkflowRepository,
    F: FileRepository,
    X: ContentExtractor,
    C: RecordStoreClient,
{
    pub fn new(workflows: Arc<W>, files: Arc<F>, extractor: Arc<X>, records: Arc<C>) -> Self {
        Self {
            workflows,
            files,
            extractor,
            records,
        }
    }

    /// Run every step of `workflow` for `execution`.
    ///
    /// Returns `{steps_executed, steps_successful, steps_failed, results}`,
    /// or `{message}` when the workflow has no steps.
    pub async fn run(
        &self,
        workflow: &Workflow,
        execution: &WorkflowExecution,
    ) -> Result<Value, RunError> {
        let steps = &workflow.config.steps;
        if steps.is_empty() {
            return Ok(json!({ "message": "no steps configured" }));
        }

        let file = match execution.triggered_file_id {
            Some(file_id) => self.files.get_file(&file_id).await?,
            None => None,
        };
        let mut ctx = ExecutionContext::for_execution(execution, file.as_ref());

        let mut results = Vec::with_capacity(steps.len());
        let mut successful = 0usize;
        let mut failed = 0usize;

        for (index, raw) in steps.iter().enumerate() {
            let number = index + 1;
            let decoded = StepSpec::decode(raw);
            let (label, name, continue_on_error) = match &decoded {
                Ok(step) => (
                    step.name.clone(),
                    step.display_name(number),
                    step.continue_on_error,
                ),
                // Undecodable steps still honour their common fields.
                Err(_) => {
                    let label = raw.get("name").and_then(Value::as_str).map(str::to_string);
                    let name = label.clone().unwrap_or_else(|| format!("Step {number}"));
                    let continue_on_error = raw
                        .get("continue_on_error")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    (label, name, continue_on_error)
                }
            };

            self.append_log(
                &execution.id,
                &format!(
                    "Executing step {number}: {}\n",
                    label.as_deref().unwrap_or("Unnamed")
                ),
            )
            .await;

            match self.execute_step(decoded, &ctx, execution).await {
                Ok(result) => {
                    tracing::debug!(execution_id = %execution.id, step = number, "step succeeded");
                    ctx.set(format!("step_{number}_result"), result.clone());
                    results.push(json!({
                        "step": number,
                        "name": name,
                        "result": result,
                        "status": "success",
                    }));
                    successful += 1;
                }
                Err(e) => {
                    self.append_log(&execution.id, &format!("Step {number} failed: {e}\n"))
                        .await;
                    tracing::warn!(
                        execution_id = %execution.id,
                        step = number,
                        error = %e,
                        "step failed"
                    );
                    results.push(json!({
                        "step": number,
                        "name": name,
                        "error": e.to_string(),
                        "status": "failed",
                    }));
                    failed += 1;

                    if !continue_on_error {
                        return Err(RunError::Stopped {
                            step: number,
                            source: e,
                        });
                    }
                }
            }
        }

        Ok(json!({
            "steps_executed": results.len(),
            "steps_successful": successful,
            "steps_failed": failed,
            "results": results,
        }))
    }

    async fn append_log(&self, execution_id: &Uuid, text: &str) {
        if let Err(e) = self.workflows.append_execution_log(execution_id, text).await {
            tracing::warn!(%execution_id, error = %e, "failed to append execution log");
        }
    }

    async fn execute_step(
        &self,
        decoded: Result<StepSpec, StepDecodeError>,
        ctx: &ExecutionContext,
        execution: &WorkflowExecution,
    ) -> Result<Value, StepError> {
        let step = decoded?;

        match step.kind {
            StepKind::Log { message } => Ok(run_log(ctx, &message, &execution.id)),
            StepKind::FileProcess { file_id } => {
                self.run_file_process(file_id.or(execution.triggered_file_id))
                    .await
            }
            StepKind::AirtableCreate { table, fields } => {
                self.run_record_create(ctx, &table, &fields).await
            }
            StepKind::AirtableUpdate {
                table,
                record_id,
                fields,
            } => self.run_record_update(ctx, &table, &record_id, &fields).await,
            StepKind::Delay { delay } => run_delay(delay).await,
            StepKind::Condition { condition } => Ok(run_condition(ctx, &condition)),
        }
    }

    async fn run_file_process(&self, file_id: Option<Uuid>) -> Result<Value, StepError> {
        let file_id = file_id.ok_or_else(|| {
            StepError::MissingInput("no file id specified for file_process step".to_string())
        })?;

        let mut file = self
            .files
            .get_file(&file_id)
            .await?
            .ok_or(StepError::FileNotFound(file_id))?;

        if file.status != FileStatus::Processed {
            file = process_file_content(self.files.as_ref(), self.extractor.as_ref(), &file)
                .await?;
        }

        Ok(json!({
            "file_id": file.id.to_string(),
            "status": file.status.as_str(),
            "content_length": file.content.as_deref().map(|c| c.chars().count()).unwrap_or(0),
            "metadata": file.metadata,
        }))
    }

    async fn run_record_create(
        &self,
        ctx: &ExecutionContext,
        table: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value, StepError> {
        let fields = ctx.substitute_fields(fields);
        let record_id = self.records.create_record(table, &fields).await?;
        tracing::info!(table, %record_id, "record created");
        Ok(json!({
            "table": table,
            "fields": fields,
            "record_id": record_id,
            "success": true,
        }))
    }

    async fn run_record_update(
        &self,
        ctx: &ExecutionContext,
        table: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value, StepError> {
        let fields = ctx.substitute_fields(fields);
        self.records.update_record(table, record_id, &fields).await?;
        tracing::info!(table, record_id, "record updated");
        Ok(json!({
            "table": table,
            "record_id": record_id,
            "fields": fields,
            "success": true,
        }))
    }
}

// ---------------------------------------------------------------------------
// Pure step kinds
// ---------------------------------------------------------------------------

fn run_log(ctx: &ExecutionContext, template: &str, execution_id: &Uuid) -> Value {
    let message = ctx.substitute(template);
    tracing::info!(%execution_id, "workflow log: {message}");
    json!({ "message": message })
}

async fn run_delay(seconds: f64) -> Result<Value, StepError> {
    let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
        StepError::InvalidStep(format!("delay must be a non-negative number, got {seconds}"))
    })?;
    tokio::time::sleep(duration).await;
    Ok(json!({ "delayed_seconds": seconds }))
}

/// Evaluate a condition. Only the left operand is substituted; both sides
/// are compared as strings. Unknown operators evaluate to false.
fn run_condition(ctx: &ExecutionContext, condition: &ConditionSpec) -> Value {
    let left = ctx.substitute_value(&condition.left);
    let left_text = stringify(&left);
    let right_text = stringify(&condition.right);

    let met = match condition.operator.as_str() {
        "equals" => left_text == right_text,
        "not_equals" => left_text != right_text,
        "contains" => left_text.contains(&right_text),
        "not_contains" => !left_text.contains(&right_text),
        _ => false,
    };

    json!({
        "condition_met": met,
        "left_value": left,
        "right_value": condition.right,
        "condition_type": condition.operator,
    })
}
