//! SQLite workflow repository implementation.
//!
//! Implements `WorkflowRepository` from `autoflow-core` using sqlx with split
//! read/write pools. Step lists and trigger rules are stored as JSON text.
//! Execution status transitions are guarded in the `WHERE` clause so that a
//! terminal status, once written, is never overwritten.

use std::collections::BTreeMap;

use autoflow_core::repository::workflow::WorkflowRepository;
use autoflow_types::error::RepositoryError;
use autoflow_types::execution::{ExecutionStatus, TriggerKind, WorkflowExecution};
use autoflow_types::workflow::{Workflow, WorkflowConfig, WorkflowStats, WorkflowStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{
    format_datetime, parse_datetime, parse_json, parse_optional_datetime, parse_uuid, query_err,
    to_json,
};

/// SQLite-backed implementation of `WorkflowRepository`.
pub struct SqliteWorkflowRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct WorkflowRow {
    id: String,
    name: String,
    description: Option<String>,
    config: String,
    triggers: String,
    cron_expression: Option<String>,
    status: String,
    is_enabled: bool,
    next_run: Option<String>,
    execution_count: i64,
    success_count: i64,
    failure_count: i64,
    last_execution_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl WorkflowRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            config: row.try_get("config")?,
            triggers: row.try_get("triggers")?,
            cron_expression: row.try_get("cron_expression")?,
            status: row.try_get("status")?,
            is_enabled: row.try_get("is_enabled")?,
            next_run: row.try_get("next_run")?,
            execution_count: row.try_get("execution_count")?,
            success_count: row.try_get("success_count")?,
            failure_count: row.try_get("failure_count")?,
            last_execution_at: row.try_get("last_execution_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_workflow(self) -> Result<Workflow, RepositoryError> {
        let status: WorkflowStatus = self
            .status
            .parse()
            .map_err(|bad| RepositoryError::Query(format!("invalid workflow status: {bad}")))?;
        let config: WorkflowConfig = parse_json(&self.config, "workflow config")?;

        Ok(Workflow {
            id: parse_uuid(&self.id)?,
            name: self.name,
            description: self.description,
            config,
            triggers: parse_json(&self.triggers, "workflow triggers")?,
            cron_expression: self.cron_expression,
            status,
            is_enabled: self.is_enabled,
            next_run: parse_optional_datetime(self.next_run.as_deref())?,
            execution_count: self.execution_count,
            success_count: self.success_count,
            failure_count: self.failure_count,
            last_execution_at: parse_optional_datetime(self.last_execution_at.as_deref())?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct ExecutionRow {
    id: String,
    workflow_id: String,
    status: String,
    trigger_type: String,
    trigger_data: String,
    triggered_file_id: Option<String>,
    result: Option<String>,
    error_message: Option<String>,
    logs: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    duration: Option<f64>,
    created_at: String,
    updated_at: String,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            status: row.try_get("status")?,
            trigger_type: row.try_get("trigger_type")?,
            trigger_data: row.try_get("trigger_data")?,
            triggered_file_id: row.try_get("triggered_file_id")?,
            result: row.try_get("result")?,
            error_message: row.try_get("error_message")?,
            logs: row.try_get("logs")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            duration: row.try_get("duration")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_execution(self) -> Result<WorkflowExecution, RepositoryError> {
        let status: ExecutionStatus = self
            .status
            .parse()
            .map_err(|bad| RepositoryError::Query(format!("invalid execution status: {bad}")))?;
        let trigger_type: TriggerKind = self
            .trigger_type
            .parse()
            .map_err(|bad| RepositoryError::Query(format!("invalid trigger type: {bad}")))?;
        let result: Option<Value> = self
            .result
            .as_deref()
            .map(|s| parse_json(s, "execution result"))
            .transpose()?;

        Ok(WorkflowExecution {
            id: parse_uuid(&self.id)?,
            workflow_id: parse_uuid(&self.workflow_id)?,
            status,
            trigger_type,
            trigger_data: parse_json(&self.trigger_data, "trigger data")?,
            triggered_file_id: self.triggered_file_id.as_deref().map(parse_uuid).transpose()?,
            result,
            error_message: self.error_message,
            logs: self.logs,
            started_at: parse_optional_datetime(self.started_at.as_deref())?,
            completed_at: parse_optional_datetime(self.completed_at.as_deref())?,
            duration: self.duration,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

/// Every known status with its count, zero-filled.
fn breakdown<'a>(
    names: impl Iterator<Item = &'a str>,
    counted: Vec<(String, i64)>,
) -> BTreeMap<String, i64> {
    let mut map: BTreeMap<String, i64> = names.map(|n| (n.to_string(), 0)).collect();
    for (status, count) in counted {
        map.insert(status, count);
    }
    map
}

// ---------------------------------------------------------------------------
// WorkflowRepository implementation
// ---------------------------------------------------------------------------

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO workflows (
                id, name, description, config, triggers, cron_expression, status,
                is_enabled, next_run, execution_count, success_count, failure_count,
                last_execution_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(to_json(&workflow.config, "workflow config")?)
        .bind(to_json(&workflow.triggers, "workflow triggers")?)
        .bind(&workflow.cron_expression)
        .bind(workflow.status.as_str())
        .bind(workflow.is_enabled)
        .bind(workflow.next_run.as_ref().map(format_datetime))
        .bind(workflow.execution_count)
        .bind(workflow.success_count)
        .bind(workflow.failure_count)
        .bind(workflow.last_execution_at.as_ref().map(format_datetime))
        .bind(format_datetime(&workflow.created_at))
        .bind(format_datetime(&workflow.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(workflow.id.to_string())
            }
            other => query_err(other),
        })?;

        Ok(())
    }

    async fn get_workflow(&self, id: &Uuid) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(ref r) => {
                let wf = WorkflowRow::from_row(r).map_err(query_err)?;
                Ok(Some(wf.into_workflow()?))
            }
            None => Ok(None),
        }
    }

    async fn list_workflows(
        &self,
        skip: u32,
        limit: u32,
        status: Option<WorkflowStatus>,
    ) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM workflows WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(status.map(|s| s.as_str()))
        .bind(i64::from(limit))
        .bind(i64::from(skip))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|r| {
                WorkflowRow::from_row(r)
                    .map_err(query_err)?
                    .into_workflow()
            })
            .collect()
    }

    async fn update_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE workflows SET
                name = ?, description = ?, config = ?, triggers = ?, cron_expression = ?,
                status = ?, is_enabled = ?, updated_at = ?
            WHERE id = ?"#,
        )
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(to_json(&workflow.config, "workflow config")?)
        .bind(to_json(&workflow.triggers, "workflow triggers")?)
        .bind(&workflow.cron_expression)
        .bind(workflow.status.as_str())
        .bind(workflow.is_enabled)
        .bind(format_datetime(&workflow.updated_at))
        .bind(workflow.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_workflow(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_due_workflows(&self, now: DateTime<Utc>) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM workflows \
             WHERE status = 'active' AND is_enabled = 1 AND cron_expression IS NOT NULL \
             AND (next_run IS NULL OR next_run <= ?) \
             ORDER BY created_at ASC",
        )
        .bind(format_datetime(&now))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|r| {
                WorkflowRow::from_row(r)
                    .map_err(query_err)?
                    .into_workflow()
            })
            .collect()
    }

    async fn list_runnable_workflows(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM workflows WHERE status = 'active' AND is_enabled = 1 \
             ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|r| {
                WorkflowRow::from_row(r)
                    .map_err(query_err)?
                    .into_workflow()
            })
            .collect()
    }

    async fn list_workflow_ids(&self) -> Result<Vec<Uuid>, RepositoryError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM workflows")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        rows.iter().map(|(id,)| parse_uuid(id)).collect()
    }

    async fn set_next_run(
        &self,
        id: &Uuid,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE workflows SET next_run = ? WHERE id = ?")
            .bind(next_run.as_ref().map(format_datetime))
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(())
    }

    async fn record_execution_outcome(
        &self,
        id: &Uuid,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let (succeeded, failed) = if success { (1_i64, 0_i64) } else { (0, 1) };
        sqlx::query(
            r#"UPDATE workflows SET
                execution_count = execution_count + 1,
                success_count = success_count + ?,
                failure_count = failure_count + ?,
                last_execution_at = ?
            WHERE id = ?"#,
        )
        .bind(succeeded)
        .bind(failed)
        .bind(format_datetime(&at))
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn workflow_stats(&self, since: DateTime<Utc>) -> Result<WorkflowStats, RepositoryError> {
        let workflow_counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM workflows GROUP BY status")
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_err)?;
        let execution_counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM workflow_executions GROUP BY status")
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_err)?;
        let (recent,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM workflow_executions WHERE created_at >= ?")
                .bind(format_datetime(&since))
                .fetch_one(&self.pool.reader)
                .await
                .map_err(query_err)?;

        let total_workflows = workflow_counts.iter().map(|(_, n)| n).sum();
        let total_executions = execution_counts.iter().map(|(_, n)| n).sum();

        Ok(WorkflowStats {
            total_workflows,
            workflow_status_breakdown: breakdown(
                WorkflowStatus::ALL.iter().map(|s| s.as_str()),
                workflow_counts,
            ),
            total_executions,
            execution_status_breakdown: breakdown(
                ExecutionStatus::ALL.iter().map(|s| s.as_str()),
                execution_counts,
            ),
            recent_executions_24h: recent,
        })
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        let result = execution
            .result
            .as_ref()
            .map(|r| to_json(r, "execution result"))
            .transpose()?;

        sqlx::query(
            r#"INSERT INTO workflow_executions (
                id, workflow_id, status, trigger_type, trigger_data, triggered_file_id,
                result, error_message, logs, started_at, completed_at, duration,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(execution.id.to_string())
        .bind(execution.workflow_id.to_string())
        .bind(execution.status.as_str())
        .bind(execution.trigger_type.as_str())
        .bind(to_json(&execution.trigger_data, "trigger data")?)
        .bind(execution.triggered_file_id.map(|id| id.to_string()))
        .bind(result)
        .bind(&execution.error_message)
        .bind(&execution.logs)
        .bind(execution.started_at.as_ref().map(format_datetime))
        .bind(execution.completed_at.as_ref().map(format_datetime))
        .bind(execution.duration)
        .bind(format_datetime(&execution.created_at))
        .bind(format_datetime(&execution.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<WorkflowExecution>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflow_executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(ref r) => {
                let exec = ExecutionRow::from_row(r).map_err(query_err)?;
                Ok(Some(exec.into_execution()?))
            }
            None => Ok(None),
        }
    }

    async fn list_executions(
        &self,
        workflow_id: Option<&Uuid>,
        skip: u32,
        limit: u32,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM workflow_executions \
             WHERE (?1 IS NULL OR workflow_id = ?1) AND (?2 IS NULL OR status = ?2) \
             ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4",
        )
        .bind(workflow_id.map(|id| id.to_string()))
        .bind(status.map(|s| s.as_str()))
        .bind(i64::from(limit))
        .bind(i64::from(skip))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|r| {
                ExecutionRow::from_row(r)
                    .map_err(query_err)?
                    .into_execution()
            })
            .collect()
    }

    async fn has_running_execution(&self, workflow_id: &Uuid) -> Result<bool, RepositoryError> {
        let (running,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM workflow_executions WHERE workflow_id = ? AND status = 'running'",
        )
        .bind(workflow_id.to_string())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_err)?;

        Ok(running > 0)
    }

    async fn mark_execution_running(
        &self,
        id: &Uuid,
        started_at: DateTime<Utc>,
        log: &str,
    ) -> Result<bool, RepositoryError> {
        let ts = format_datetime(&started_at);
        let result = sqlx::query(
            "UPDATE workflow_executions SET status = 'running', started_at = ?1, logs = ?2, updated_at = ?1 \
             WHERE id = ?3 AND status = 'pending'",
        )
        .bind(&ts)
        .bind(log)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_execution_log(&self, id: &Uuid, text: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE workflow_executions SET logs = logs || ? WHERE id = ?")
            .bind(text)
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(())
    }

    async fn complete_execution(
        &self,
        id: &Uuid,
        result: &Value,
        completed_at: DateTime<Utc>,
        duration: f64,
    ) -> Result<bool, RepositoryError> {
        let ts = format_datetime(&completed_at);
        let outcome = sqlx::query(
            "UPDATE workflow_executions SET status = 'completed', result = ?1, completed_at = ?2, \
             duration = ?3, updated_at = ?2 WHERE id = ?4 AND status = 'running'",
        )
        .bind(to_json(result, "execution result")?)
        .bind(&ts)
        .bind(duration)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(outcome.rows_affected() > 0)
    }

    async fn fail_execution(
        &self,
        id: &Uuid,
        error: &str,
        completed_at: DateTime<Utc>,
        duration: f64,
    ) -> Result<bool, RepositoryError> {
        let ts = format_datetime(&completed_at);
        let outcome = sqlx::query(
            "UPDATE workflow_executions SET status = 'failed', error_message = ?1, completed_at = ?2, \
             duration = ?3, updated_at = ?2 WHERE id = ?4 AND status = 'running'",
        )
        .bind(error)
        .bind(&ts)
        .bind(duration)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(outcome.rows_affected() > 0)
    }

    async fn cancel_execution(
        &self,
        id: &Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let ts = format_datetime(&completed_at);
        let outcome = sqlx::query(
            "UPDATE workflow_executions SET status = 'cancelled', completed_at = ?1, updated_at = ?1 \
             WHERE id = ?2 AND status IN ('pending', 'running')",
        )
        .bind(&ts)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(outcome.rows_affected() > 0)
    }

    async fn cancel_running_executions(
        &self,
        workflow_id: &Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let ts = format_datetime(&completed_at);
        let outcome = sqlx::query(
            "UPDATE workflow_executions SET status = 'cancelled', completed_at = ?1, updated_at = ?1 \
             WHERE workflow_id = ?2 AND status = 'running'",
        )
        .bind(&ts)
        .bind(workflow_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(outcome.rows_affected())
    }

    async fn cancel_interrupted_executions(
        &self,
        completed_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let ts = format_datetime(&completed_at);
        let outcome = sqlx::query(
            "UPDATE workflow_executions SET status = 'cancelled', completed_at = ?1, updated_at = ?1 \
             WHERE status IN ('pending', 'running')",
        )
        .bind(&ts)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(outcome.rows_affected())
    }

    async fn prune_executions(&self, workflow_id: &Uuid, keep: u32) -> Result<u64, RepositoryError> {
        let outcome = sqlx::query(
            r#"DELETE FROM workflow_executions
            WHERE workflow_id = ?1
              AND status IN ('completed', 'failed', 'cancelled')
              AND id NOT IN (
                  SELECT id FROM workflow_executions
                  WHERE workflow_id = ?1
                  ORDER BY created_at DESC, id DESC
                  LIMIT ?2
              )"#,
        )
        .bind(workflow_id.to_string())
        .bind(i64::from(keep))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(outcome.rows_affected())
    }
}
