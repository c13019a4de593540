//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use autoflow_types::error::WorkflowError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Errors from the workflow, execution and file services.
    Workflow(WorkflowError),
    /// Malformed request input caught in the HTTP layer.
    Validation(String),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Workflow(e) => {
                let (status, code) = match e {
                    WorkflowError::NotFound(_) => (StatusCode::NOT_FOUND, "WORKFLOW_NOT_FOUND"),
                    WorkflowError::ExecutionNotFound(_) => {
                        (StatusCode::NOT_FOUND, "EXECUTION_NOT_FOUND")
                    }
                    WorkflowError::FileNotFound(_) => (StatusCode::NOT_FOUND, "FILE_NOT_FOUND"),
                    WorkflowError::NotActive(_) => (StatusCode::BAD_REQUEST, "WORKFLOW_NOT_ACTIVE"),
                    WorkflowError::Disabled(_) => (StatusCode::BAD_REQUEST, "WORKFLOW_DISABLED"),
                    WorkflowError::InvalidCron(_) => (StatusCode::BAD_REQUEST, "INVALID_CRON"),
                    WorkflowError::InvalidStatus(_) => (StatusCode::BAD_REQUEST, "INVALID_STATUS"),
                    WorkflowError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                    WorkflowError::Storage(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
                    }
                };
                (status, code, e.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(%code, %message, "request failed");
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
