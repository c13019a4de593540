//! Execution history retention.
//!
//! Keeps, per workflow, the `keep` most recent executions by creation time
//! (any status) and deletes older executions that are terminal. PENDING and
//! RUNNING executions are never deleted.

use std::sync::Arc;

use autoflow_types::error::RepositoryError;

use crate::repository::workflow::WorkflowRepository;

pub struct RetentionManager<W> {
    workflows: Arc<W>,
    keep: u32,
}

impl<W: WorkflowRepository> RetentionManager<W> {
    pub fn new(workflows: Arc<W>, keep: u32) -> Self {
        Self { workflows, keep }
    }

    /// Prune every workflow's history. Returns the number of deleted
    /// executions. A failure for one workflow is logged and skipped.
    pub async fn sweep(&self) -> Result<u64, RepositoryError> {
        let ids = self.workflows.list_workflow_ids().await?;
        let mut deleted = 0u64;

        for id in ids {
            match self.workflows.prune_executions(&id, self.keep).await {
                Ok(0) => {}
                Ok(n) => {
                    tracing::info!(workflow_id = %id, deleted = n, "cleaned up old executions");
                    deleted += n;
                }
                Err(e) => {
                    tracing::error!(workflow_id = %id, error = %e, "error cleaning up executions");
                }
            }
        }

        Ok(deleted)
    }
}
