use thiserror::Error;
use uuid::Uuid;

/// Errors from repository operations (used by trait definitions in autoflow-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced by the administrative surface and the execution
/// coordinator.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow {0} not found")]
    NotFound(Uuid),

    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    #[error("file {0} not found")]
    FileNotFound(Uuid),

    #[error("workflow {0} is not active")]
    NotActive(Uuid),

    #[error("workflow {0} is disabled")]
    Disabled(Uuid),

    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for WorkflowError {
    fn from(e: RepositoryError) -> Self {
        WorkflowError::Storage(e.to_string())
    }
}

impl WorkflowError {
    /// Input or state problems the caller can fix (4xx-style).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, WorkflowError::Storage(_))
    }
}
