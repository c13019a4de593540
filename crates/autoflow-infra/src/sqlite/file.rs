//! SQLite file repository implementation.

use std::collections::BTreeMap;

use autoflow_core::repository::file::FileRepository;
use autoflow_types::error::RepositoryError;
use autoflow_types::file::{FileRecord, FileStats, FileStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{
    format_datetime, parse_datetime, parse_json, parse_optional_datetime, parse_uuid, query_err,
    to_json,
};

/// SQLite-backed implementation of `FileRepository`.
pub struct SqliteFileRepository {
    pool: DatabasePool,
}

impl SqliteFileRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct FileRow {
    id: String,
    filename: String,
    original_filename: String,
    file_path: String,
    file_size: i64,
    mime_type: Option<String>,
    file_hash: Option<String>,
    status: String,
    content: Option<String>,
    metadata: String,
    processing_started_at: Option<String>,
    processing_completed_at: Option<String>,
    processing_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl FileRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            filename: row.try_get("filename")?,
            original_filename: row.try_get("original_filename")?,
            file_path: row.try_get("file_path")?,
            file_size: row.try_get("file_size")?,
            mime_type: row.try_get("mime_type")?,
            file_hash: row.try_get("file_hash")?,
            status: row.try_get("status")?,
            content: row.try_get("content")?,
            metadata: row.try_get("metadata")?,
            processing_started_at: row.try_get("processing_started_at")?,
            processing_completed_at: row.try_get("processing_completed_at")?,
            processing_error: row.try_get("processing_error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<FileRecord, RepositoryError> {
        let status: FileStatus = self
            .status
            .parse()
            .map_err(|bad| RepositoryError::Query(format!("invalid file status: {bad}")))?;

        Ok(FileRecord {
            id: parse_uuid(&self.id)?,
            filename: self.filename,
            original_filename: self.original_filename,
            file_path: self.file_path,
            file_size: self.file_size,
            mime_type: self.mime_type,
            file_hash: self.file_hash,
            status,
            content: self.content,
            metadata: parse_json(&self.metadata, "file metadata")?,
            processing_started_at: parse_optional_datetime(self.processing_started_at.as_deref())?,
            processing_completed_at: parse_optional_datetime(
                self.processing_completed_at.as_deref(),
            )?,
            processing_error: self.processing_error,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl FileRepository for SqliteFileRepository {
    async fn create_file(&self, file: &FileRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO files (
                id, filename, original_filename, file_path, file_size, mime_type, file_hash,
                status, content, metadata, processing_started_at, processing_completed_at,
                processing_error, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(file.id.to_string())
        .bind(&file.filename)
        .bind(&file.original_filename)
        .bind(&file.file_path)
        .bind(file.file_size)
        .bind(&file.mime_type)
        .bind(&file.file_hash)
        .bind(file.status.as_str())
        .bind(&file.content)
        .bind(to_json(&file.metadata, "file metadata")?)
        .bind(file.processing_started_at.as_ref().map(format_datetime))
        .bind(file.processing_completed_at.as_ref().map(format_datetime))
        .bind(&file.processing_error)
        .bind(format_datetime(&file.created_at))
        .bind(format_datetime(&file.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(file.filename.clone())
            }
            other => query_err(other),
        })?;

        Ok(())
    }

    async fn get_file(&self, id: &Uuid) -> Result<Option<FileRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM files WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(ref r) => Ok(Some(FileRow::from_row(r).map_err(query_err)?.into_record()?)),
            None => Ok(None),
        }
    }

    async fn list_files(
        &self,
        skip: u32,
        limit: u32,
        status: Option<FileStatus>,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM files WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(status.map(|s| s.as_str()))
        .bind(i64::from(limit))
        .bind(i64::from(skip))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|r| FileRow::from_row(r).map_err(query_err)?.into_record())
            .collect()
    }

    async fn update_file_status(
        &self,
        id: &Uuid,
        status: FileStatus,
        content: Option<&str>,
        metadata: Option<&Value>,
        error: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let metadata = metadata.map(|m| to_json(m, "file metadata")).transpose()?;
        let now = format_datetime(&Utc::now());

        let result = sqlx::query(
            r#"UPDATE files SET
                status = ?1,
                processing_started_at = CASE WHEN ?1 = 'processing' THEN ?2 ELSE processing_started_at END,
                processing_completed_at = CASE WHEN ?1 IN ('processed', 'failed') THEN ?2 ELSE processing_completed_at END,
                content = COALESCE(?3, content),
                metadata = COALESCE(?4, metadata),
                processing_error = COALESCE(?5, processing_error),
                updated_at = ?2
            WHERE id = ?6"#,
        )
        .bind(status.as_str())
        .bind(&now)
        .bind(content)
        .bind(metadata)
        .bind(error)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn file_stats(&self, since: DateTime<Utc>) -> Result<FileStats, RepositoryError> {
        let counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM files GROUP BY status")
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_err)?;
        let (total_size,): (i64,) = sqlx::query_as("SELECT COALESCE(SUM(file_size), 0) FROM files")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;
        let (recent,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files WHERE created_at >= ?")
            .bind(format_datetime(&since))
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut status_breakdown: BTreeMap<String, i64> = FileStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut total_files = 0;
        for (status, n) in counts {
            total_files += n;
            status_breakdown.insert(status, n);
        }

        Ok(FileStats {
            total_files,
            status_breakdown,
            total_size_bytes: total_size,
            recent_uploads_24h: recent,
        })
    }
}
