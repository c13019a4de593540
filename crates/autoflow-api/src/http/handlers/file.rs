//! File record handlers: lookup, content processing and event dispatch.
//!
//! Uploading is handled elsewhere; these endpoints operate on file records
//! that already exist. Processing a file and reporting an event both feed
//! the file-event trigger path of the coordinator.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use autoflow_types::execution::TriggerKind;
use autoflow_types::file::{FileRecord, FileStatus};

use crate::http::error::AppError;
use crate::http::extractors::query::ListQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// A file record together with the runs it started.
#[derive(Debug, Serialize)]
pub struct FileDispatch {
    pub file: FileRecord,
    pub trigger_type: Option<TriggerKind>,
    pub execution_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct FileEventRequest {
    pub trigger_type: String,
}

/// GET /api/v1/files - List file records, newest first.
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<FileRecord>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let files = state
        .file_service
        .list(query.skip, query.limit, query.status.as_deref())
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(
        ApiResponse::success(files, request_id, elapsed).with_link("self", "/api/v1/files"),
    ))
}

/// GET /api/v1/files/{id}
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FileRecord>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let file = state.file_service.get(&id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(
        ApiResponse::success(file, request_id, elapsed)
            .with_link("self", &format!("/api/v1/files/{id}")),
    ))
}

/// POST /api/v1/files/{id}/process - Extract content, then fire
/// `file_processed` triggers if extraction succeeded.
pub async fn process_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FileDispatch>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let file = state.file_service.process(&id).await?;

    let (trigger_type, execution_ids) = if file.status == FileStatus::Processed {
        let started = state
            .coordinator
            .dispatch_file_event(&file, TriggerKind::FileProcessed)
            .await?;
        (
            Some(TriggerKind::FileProcessed),
            started.iter().map(|e| e.id).collect(),
        )
    } else {
        (None, Vec::new())
    };

    let elapsed = start.elapsed().as_millis() as u64;
    let dispatch = FileDispatch {
        file,
        trigger_type,
        execution_ids,
    };
    Ok(Json(
        ApiResponse::success(dispatch, request_id, elapsed)
            .with_link("file", &format!("/api/v1/files/{id}")),
    ))
}

/// POST /api/v1/files/{id}/events - Report a file event to the trigger
/// matcher. Only `file_upload` and `file_processed` are accepted.
pub async fn file_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<FileEventRequest>,
) -> Result<Json<ApiResponse<FileDispatch>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let trigger_type = parse_file_event(&body.trigger_type)?;
    let file = state.file_service.get(&id).await?;
    let started = state
        .coordinator
        .dispatch_file_event(&file, trigger_type)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let dispatch = FileDispatch {
        file,
        trigger_type: Some(trigger_type),
        execution_ids: started.iter().map(|e| e.id).collect(),
    };
    Ok(Json(
        ApiResponse::success(dispatch, request_id, elapsed)
            .with_link("file", &format!("/api/v1/files/{id}")),
    ))
}

fn parse_file_event(raw: &str) -> Result<TriggerKind, AppError> {
    match raw.parse::<TriggerKind>() {
        Ok(kind @ (TriggerKind::FileUpload | TriggerKind::FileProcessed)) => Ok(kind),
        _ => Err(AppError::Validation(format!(
            "trigger_type must be 'file_upload' or 'file_processed', got '{raw}'"
        ))),
    }
}
