//! Dashboard statistics endpoint.
//!
//! GET /api/v1/stats - Workflow, execution and file counts plus scheduler
//! state.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde_json::Value;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/stats - Aggregate dashboard statistics.
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let workflows = state.workflow_service.stats().await?;
    let files = state.file_service.stats().await?;
    let scheduler = state.scheduler.status().await;

    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::json!({
        "workflows": workflows,
        "files": files,
        "scheduler": scheduler,
    });

    let resp = ApiResponse::success(data, request_id, elapsed)
        .with_link("self", "/api/v1/stats")
        .with_link("workflows", "/api/v1/workflows")
        .with_link("executions", "/api/v1/executions");

    Ok(Json(resp))
}
