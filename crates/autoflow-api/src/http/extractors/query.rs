//! Query parameter extractors for list endpoints.

use serde::Deserialize;
use uuid::Uuid;

use autoflow_core::service::DEFAULT_PAGE_LIMIT;

/// Pagination and status filter for workflow and file lists.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Validated by the service; unknown values are a 400.
    pub status: Option<String>,
}

/// Execution list query, optionally scoped to one workflow.
#[derive(Debug, Deserialize)]
pub struct ExecutionListQuery {
    pub workflow_id: Option<Uuid>,
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub status: Option<String>,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}
