//! Administrative services consumed by the API layer.

pub mod file;
pub mod workflow;

use autoflow_types::error::WorkflowError;

/// Default page size for list operations.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Largest page size a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Reject page sizes outside `1..=MAX_PAGE_LIMIT`.
pub fn check_limit(limit: u32) -> Result<u32, WorkflowError> {
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(WorkflowError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }
    Ok(limit)
}

/// Parse an optional status filter, mapping bad values to `InvalidStatus`.
pub fn parse_status_filter<T: std::str::FromStr>(
    status: Option<&str>,
) -> Result<Option<T>, WorkflowError> {
    status
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| WorkflowError::InvalidStatus(s.to_string()))
        })
        .transpose()
}
