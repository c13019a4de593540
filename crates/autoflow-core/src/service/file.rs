//! File service: lookups, statistics and content processing.

use std::sync::Arc;

use autoflow_types::error::{RepositoryError, WorkflowError};
use autoflow_types::file::{Extraction, FileRecord, FileStats, FileStatus};
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::{check_limit, parse_status_filter};
use crate::integration::extractor::ContentExtractor;
use crate::repository::file::FileRepository;

/// Run content extraction for a file and record the outcome.
///
/// Moves the record to `Processing`, then to `Processed` (with content and
/// metadata) or `Failed` (with the extractor's error). An extraction failure
/// is a file outcome, not an error of this function. Returns the refreshed
/// record.
pub async fn process_file_content<F, X>(
    files: &F,
    extractor: &X,
    file: &FileRecord,
) -> Result<FileRecord, RepositoryError>
where
    F: FileRepository,
    X: ContentExtractor,
{
    tracing::info!(file_id = %file.id, filename = %file.filename, "processing file");
    files
        .update_file_status(&file.id, FileStatus::Processing, None, None, None)
        .await?;

    match extractor.extract(&file.file_path).await {
        Extraction::Content { content, metadata } => {
            files
                .update_file_status(
                    &file.id,
                    FileStatus::Processed,
                    Some(&content),
                    Some(&metadata),
                    None,
                )
                .await?;
            tracing::info!(file_id = %file.id, "file processed");
        }
        Extraction::Error { error, metadata } => {
            files
                .update_file_status(
                    &file.id,
                    FileStatus::Failed,
                    None,
                    Some(&metadata),
                    Some(&error),
                )
                .await?;
            tracing::warn!(file_id = %file.id, %error, "file processing failed");
        }
    }

    files.get_file(&file.id).await?.ok_or(RepositoryError::NotFound)
}

/// Read-side file operations plus on-demand processing.
pub struct FileService<F, X> {
    files: Arc<F>,
    extractor: Arc<X>,
}

impl<F: FileRepository, X: ContentExtractor> FileService<F, X> {
    pub fn new(files: Arc<F>, extractor: Arc<X>) -> Self {
        Self { files, extractor }
    }

    pub async fn get(&self, id: &Uuid) -> Result<FileRecord, WorkflowError> {
        self.files
            .get_file(id)
            .await?
            .ok_or(WorkflowError::FileNotFound(*id))
    }

    pub async fn list(
        &self,
        skip: u32,
        limit: u32,
        status: Option<&str>,
    ) -> Result<Vec<FileRecord>, WorkflowError> {
        let limit = check_limit(limit)?;
        let status: Option<FileStatus> = parse_status_filter(status)?;
        Ok(self.files.list_files(skip, limit, status).await?)
    }

    /// Extract content for a file regardless of its current status.
    pub async fn process(&self, id: &Uuid) -> Result<FileRecord, WorkflowError> {
        let file = self.get(id).await?;
        Ok(process_file_content(self.files.as_ref(), self.extractor.as_ref(), &file).await?)
    }

    pub async fn stats(&self) -> Result<FileStats, WorkflowError> {
        let since = Utc::now() - Duration::hours(24);
        Ok(self.files.file_stats(since).await?)
    }
}
