//! Cron expression validation endpoint.

use std::time::Instant;

use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use autoflow_core::service::workflow::{CronPreview, preview_cron};
use autoflow_core::workflow::cron::PREVIEW_COUNT;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;

/// Largest preview a caller may ask for.
const MAX_PREVIEW_COUNT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ValidateCronRequest {
    pub cron_expression: String,
    /// Number of upcoming runs to preview (default 5).
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    PREVIEW_COUNT
}

/// POST /api/v1/cron/validate - Validate an expression and preview its runs.
///
/// An invalid expression is a successful response with `valid: false`.
pub async fn validate_cron(
    Json(body): Json<ValidateCronRequest>,
) -> Result<Json<ApiResponse<CronPreview>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    if body.count == 0 || body.count > MAX_PREVIEW_COUNT {
        return Err(AppError::Validation(format!(
            "count must be between 1 and {MAX_PREVIEW_COUNT}"
        )));
    }

    let preview = preview_cron(body.cron_expression.trim(), body.count, Utc::now());

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(preview, request_id, elapsed)))
}
