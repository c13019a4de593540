//! Workflow CRUD and manual trigger handlers for the REST API.

use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use serde_json::Value;
use uuid::Uuid;

use autoflow_types::execution::WorkflowExecution;
use autoflow_types::workflow::{CreateWorkflowRequest, UpdateWorkflowRequest, Workflow};

use crate::http::error::AppError;
use crate::http::extractors::query::ListQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/workflows - Create a workflow.
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(body): Json<CreateWorkflowRequest>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let workflow = state.workflow_service.create(body).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let self_link = format!("/api/v1/workflows/{}", workflow.id);
    let resp = ApiResponse::success(workflow, request_id, elapsed).with_link("self", &self_link);

    Ok(Json(resp))
}

/// GET /api/v1/workflows - List workflows, newest first.
pub async fn list_workflows(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Workflow>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let workflows = state
        .workflow_service
        .list(query.skip, query.limit, query.status.as_deref())
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp =
        ApiResponse::success(workflows, request_id, elapsed).with_link("self", "/api/v1/workflows");

    Ok(Json(resp))
}

/// GET /api/v1/workflows/{id} - Get one workflow.
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let workflow = state.workflow_service.get(&id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(workflow, request_id, elapsed)
        .with_link("self", &format!("/api/v1/workflows/{id}"))
        .with_link("executions", &format!("/api/v1/workflows/{id}/executions"));

    Ok(Json(resp))
}

/// PUT /api/v1/workflows/{id} - Partially update a workflow.
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateWorkflowRequest>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let workflow = state.workflow_service.update(&id, body).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(workflow, request_id, elapsed)
        .with_link("self", &format!("/api/v1/workflows/{id}"));

    Ok(Json(resp))
}

/// DELETE /api/v1/workflows/{id} - Delete a workflow and its executions.
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    state.workflow_service.delete(&id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        serde_json::json!({"deleted": true, "id": id.to_string()}),
        request_id,
        elapsed,
    );

    Ok(Json(resp))
}

/// POST /api/v1/workflows/{id}/trigger - Start a manual run.
///
/// The body, if any, becomes the execution's `trigger_data`.
pub async fn trigger_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApiResponse<WorkflowExecution>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let trigger_data = parse_trigger_data(&body)?;
    let execution = state.workflow_service.trigger(&id, trigger_data).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let exec_link = format!("/api/v1/executions/{}", execution.id);
    let resp = ApiResponse::success(execution, request_id, elapsed)
        .with_link("self", &exec_link)
        .with_link("workflow", &format!("/api/v1/workflows/{id}"));

    Ok(Json(resp))
}

/// GET /api/v1/workflows/{id}/executions - Executions of one workflow.
pub async fn list_workflow_executions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<WorkflowExecution>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let executions = state
        .workflow_service
        .executions(Some(&id), query.skip, query.limit, query.status.as_deref())
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(executions, request_id, elapsed)
        .with_link("self", &format!("/api/v1/workflows/{id}/executions"))
        .with_link("workflow", &format!("/api/v1/workflows/{id}"));

    Ok(Json(resp))
}

/// An empty or `null` body means no trigger data.
fn parse_trigger_data(body: &[u8]) -> Result<Option<Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))?;
    Ok((!value.is_null()).then_some(value))
}
