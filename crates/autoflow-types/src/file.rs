//! File records consumed by file-triggered workflows and `file_process` steps.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Processing status of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
    Deleted,
}

impl FileStatus {
    pub const ALL: [FileStatus; 5] = [
        FileStatus::Uploaded,
        FileStatus::Processing,
        FileStatus::Processed,
        FileStatus::Failed,
        FileStatus::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploaded => "uploaded",
            FileStatus::Processing => "processing",
            FileStatus::Processed => "processed",
            FileStatus::Failed => "failed",
            FileStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(FileStatus::Uploaded),
            "processing" => Ok(FileStatus::Processing),
            "processed" => Ok(FileStatus::Processed),
            "failed" => Ok(FileStatus::Failed),
            "deleted" => Ok(FileStatus::Deleted),
            other => Err(other.to_string()),
        }
    }
}

/// Metadata and extracted content of a stored file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    /// Stored (unique) file name.
    pub filename: String,
    /// Name as supplied by the uploader; used for extension matching.
    pub original_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub file_hash: Option<String>,
    pub status: FileStatus,
    pub content: Option<String>,
    pub metadata: Value,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Lowercased extension of the original name including the dot, or an
    /// empty string.
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.original_filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default()
    }
}

/// Output of a content extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Content { content: String, metadata: Value },
    Error { error: String, metadata: Value },
}

/// Aggregate file counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
    pub total_files: i64,
    pub status_breakdown: BTreeMap<String, i64>,
    pub total_size_bytes: i64,
    pub recent_uploads_24h: i64,
}
