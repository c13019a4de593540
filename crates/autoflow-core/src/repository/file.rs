//! File repository trait definition.

use autoflow_types::error::RepositoryError;
use autoflow_types::file::{FileRecord, FileStats, FileStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Repository trait for file records.
///
/// Upload handling (storage, hashing, MIME sniffing) happens outside the
/// engine; this trait only reads records and records processing outcomes.
pub trait FileRepository: Send + Sync {
    fn create_file(
        &self,
        file: &FileRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_file(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<FileRecord>, RepositoryError>> + Send;

    /// List files newest first, optionally filtered by status.
    fn list_files(
        &self,
        skip: u32,
        limit: u32,
        status: Option<FileStatus>,
    ) -> impl std::future::Future<Output = Result<Vec<FileRecord>, RepositoryError>> + Send;

    /// Set the processing status. `Processing` stamps
    /// `processing_started_at`; `Processed` and `Failed` stamp
    /// `processing_completed_at`. `None` arguments leave columns untouched.
    /// Returns `false` if the file does not exist.
    fn update_file_status(
        &self,
        id: &Uuid,
        status: FileStatus,
        content: Option<&str>,
        metadata: Option<&Value>,
        error: Option<&str>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn file_stats(
        &self,
        since: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<FileStats, RepositoryError>> + Send;
}
