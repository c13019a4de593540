//! GET /api/v1/scheduler/status

use std::time::Instant;

use axum::Json;
use axum::extract::State;

use autoflow_core::workflow::scheduler::SchedulerStatus;

use crate::http::response::ApiResponse;
use crate::state::AppState;

pub async fn scheduler_status(State(state): State<AppState>) -> Json<ApiResponse<SchedulerStatus>> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let status = state.scheduler.status().await;

    let elapsed = start.elapsed().as_millis() as u64;
    Json(ApiResponse::success(status, request_id, elapsed).with_link("self", "/api/v1/scheduler/status"))
}
