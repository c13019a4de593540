//! Execution listing, inspection and cancellation handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde_json::Value;
use uuid::Uuid;

use autoflow_types::execution::WorkflowExecution;

use crate::http::error::AppError;
use crate::http::extractors::query::ExecutionListQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/executions - List executions across workflows.
pub async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ExecutionListQuery>,
) -> Result<Json<ApiResponse<Vec<WorkflowExecution>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let executions = state
        .workflow_service
        .executions(
            query.workflow_id.as_ref(),
            query.skip,
            query.limit,
            query.status.as_deref(),
        )
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(executions, request_id, elapsed)
        .with_link("self", "/api/v1/executions");

    Ok(Json(resp))
}

/// GET /api/v1/executions/{id} - Execution detail including logs.
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WorkflowExecution>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let execution = state.workflow_service.execution(&id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let workflow_link = format!("/api/v1/workflows/{}", execution.workflow_id);
    let resp = ApiResponse::success(execution, request_id, elapsed)
        .with_link("self", &format!("/api/v1/executions/{id}"))
        .with_link("workflow", &workflow_link);

    Ok(Json(resp))
}

/// POST /api/v1/executions/{id}/cancel - Cancel a running execution.
///
/// `cancelled` is false when the execution had already finished.
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let cancelled = state.workflow_service.cancel_execution(&id).await?;
    let execution = state.workflow_service.execution(&id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        serde_json::json!({
            "execution_id": id.to_string(),
            "cancelled": cancelled,
            "status": execution.status,
        }),
        request_id,
        elapsed,
    )
    .with_link("self", &format!("/api/v1/executions/{id}"));

    Ok(Json(resp))
}
