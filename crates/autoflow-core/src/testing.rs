//! In-memory fakes of the repository and collaborator traits, shared by the
//! engine's unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use autoflow_types::error::RepositoryError;
use autoflow_types::execution::{ExecutionStatus, WorkflowExecution};
use autoflow_types::file::{Extraction, FileRecord, FileStats, FileStatus};
use autoflow_types::workflow::{
    CreateWorkflowRequest, Workflow, WorkflowConfig, WorkflowStats, WorkflowStatus,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::integration::extractor::ContentExtractor;
use crate::integration::record_store::{RecordStoreClient, RecordStoreError};
use crate::repository::file::FileRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::service::workflow::WorkflowService;
use crate::workflow::coordinator::ExecutionCoordinator;
use crate::workflow::detector::TriggerDetector;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn workflow_with_steps(steps: Vec<Value>) -> Workflow {
    Workflow::new(CreateWorkflowRequest {
        name: "test workflow".to_string(),
        description: None,
        config: WorkflowConfig::new(steps),
        triggers: vec![],
        cron_expression: None,
    })
}

pub fn sample_file(name: &str) -> FileRecord {
    let now = Utc::now();
    let id = Uuid::now_v7();
    FileRecord {
        id,
        filename: format!("{id}_{name}"),
        original_filename: name.to_string(),
        file_path: format!("/tmp/uploads/{id}_{name}"),
        file_size: 1024,
        mime_type: None,
        file_hash: None,
        status: FileStatus::Uploaded,
        content: None,
        metadata: json!({}),
        processing_started_at: None,
        processing_completed_at: None,
        processing_error: None,
        created_at: now,
        updated_at: now,
    }
}

// ---------------------------------------------------------------------------
// MemoryWorkflowRepository
// ---------------------------------------------------------------------------

/// In-memory workflow store. Individual operations can be made to fail
/// ([`fail_on`](Self::fail_on)) or stall ([`slow_down`](Self::slow_down)).
#[derive(Default)]
pub struct MemoryWorkflowRepository {
    workflows: Mutex<HashMap<Uuid, Workflow>>,
    executions: Mutex<HashMap<Uuid, WorkflowExecution>>,
    faults: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn page<T>(items: Vec<T>, skip: u32, limit: u32) -> Vec<T> {
    items
        .into_iter()
        .skip(skip as usize)
        .take(limit as usize)
        .collect()
}

impl MemoryWorkflowRepository {
    /// Make every call of the named operation fail with a query error.
    pub fn fail_on(&self, op: &str) {
        self.faults.lock().unwrap().insert(op.to_string());
    }

    /// Make the named operation fail only for one workflow.
    pub fn fail_on_for(&self, op: &str, workflow_id: Uuid) {
        self.faults.lock().unwrap().insert(format!("{op}:{workflow_id}"));
    }

    pub fn clear_faults(&self) {
        self.faults.lock().unwrap().clear();
    }

    /// Sleep before applying the named operation.
    pub fn slow_down(&self, op: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(op.to_string(), delay);
    }

    fn check(&self, op: &str, workflow_id: Option<&Uuid>) -> Result<(), RepositoryError> {
        let faults = self.faults.lock().unwrap();
        let hit = faults.contains(op)
            || workflow_id.is_some_and(|id| faults.contains(&format!("{op}:{id}")));
        if hit {
            Err(RepositoryError::Query(format!("{op} unavailable")))
        } else {
            Ok(())
        }
    }

    async fn pause(&self, op: &str) {
        let delay = self.delays.lock().unwrap().get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn transition(
        &self,
        id: &Uuid,
        from: ExecutionStatus,
        apply: impl FnOnce(&mut WorkflowExecution),
    ) -> bool {
        let mut executions = self.executions.lock().unwrap();
        match executions.get_mut(id) {
            Some(exec) if exec.status == from => {
                apply(exec);
                exec.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

impl WorkflowRepository for MemoryWorkflowRepository {
    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let mut workflows = self.workflows.lock().unwrap();
        if workflows.contains_key(&workflow.id) {
            return Err(RepositoryError::Conflict(workflow.id.to_string()));
        }
        workflows.insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn get_workflow(&self, id: &Uuid) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.workflows.lock().unwrap().get(id).cloned())
    }

    async fn list_workflows(
        &self,
        skip: u32,
        limit: u32,
        status: Option<WorkflowStatus>,
    ) -> Result<Vec<Workflow>, RepositoryError> {
        let mut items: Vec<Workflow> = self
            .workflows
            .lock()
            .unwrap()
            .values()
            .filter(|wf| status.is_none_or(|s| wf.status == s))
            .cloned()
            .collect();
        newest_first(&mut items, |wf| (wf.created_at, wf.id));
        Ok(page(items, skip, limit))
    }

    async fn update_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let mut workflows = self.workflows.lock().unwrap();
        let stored = workflows.get_mut(&workflow.id).ok_or(RepositoryError::NotFound)?;
        stored.name = workflow.name.clone();
        stored.description = workflow.description.clone();
        stored.config = workflow.config.clone();
        stored.triggers = workflow.triggers.clone();
        stored.cron_expression = workflow.cron_expression.clone();
        stored.status = workflow.status;
        stored.is_enabled = workflow.is_enabled;
        stored.updated_at = workflow.updated_at;
        Ok(())
    }

    async fn delete_workflow(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let removed = self.workflows.lock().unwrap().remove(id).is_some();
        if removed {
            self.executions
                .lock()
                .unwrap()
                .retain(|_, exec| exec.workflow_id != *id);
        }
        Ok(removed)
    }

    async fn list_due_workflows(&self, now: DateTime<Utc>) -> Result<Vec<Workflow>, RepositoryError> {
        self.check("list_due_workflows", None)?;
        Ok(self
            .workflows
            .lock()
            .unwrap()
            .values()
            .filter(|wf| {
                wf.is_runnable()
                    && wf.cron_expression.is_some()
                    && wf.next_run.is_none_or(|next| next <= now)
            })
            .cloned()
            .collect())
    }

    async fn list_runnable_workflows(&self) -> Result<Vec<Workflow>, RepositoryError> {
        Ok(self
            .workflows
            .lock()
            .unwrap()
            .values()
            .filter(|wf| wf.is_runnable())
            .cloned()
            .collect())
    }

    async fn list_workflow_ids(&self) -> Result<Vec<Uuid>, RepositoryError> {
        self.check("list_workflow_ids", None)?;
        Ok(self.workflows.lock().unwrap().keys().copied().collect())
    }

    async fn set_next_run(
        &self,
        id: &Uuid,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        self.check("set_next_run", Some(id))?;
        if let Some(wf) = self.workflows.lock().unwrap().get_mut(id) {
            wf.next_run = next_run;
        }
        Ok(())
    }

    async fn record_execution_outcome(
        &self,
        id: &Uuid,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.pause("record_execution_outcome").await;
        self.check("record_execution_outcome", Some(id))?;
        if let Some(wf) = self.workflows.lock().unwrap().get_mut(id) {
            wf.execution_count += 1;
            if success {
                wf.success_count += 1;
            } else {
                wf.failure_count += 1;
            }
            wf.last_execution_at = Some(at);
        }
        Ok(())
    }

    async fn workflow_stats(&self, since: DateTime<Utc>) -> Result<WorkflowStats, RepositoryError> {
        let workflows = self.workflows.lock().unwrap();
        let executions = self.executions.lock().unwrap();

        let mut workflow_status_breakdown = BTreeMap::new();
        for status in WorkflowStatus::ALL {
            let n = workflows.values().filter(|wf| wf.status == status).count() as i64;
            workflow_status_breakdown.insert(status.as_str().to_string(), n);
        }
        let mut execution_status_breakdown = BTreeMap::new();
        for status in ExecutionStatus::ALL {
            let n = executions.values().filter(|e| e.status == status).count() as i64;
            execution_status_breakdown.insert(status.as_str().to_string(), n);
        }

        Ok(WorkflowStats {
            total_workflows: workflows.len() as i64,
            workflow_status_breakdown,
            total_executions: executions.len() as i64,
            execution_status_breakdown,
            recent_executions_24h: executions
                .values()
                .filter(|e| e.created_at >= since)
                .count() as i64,
        })
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        self.check("create_execution", Some(&execution.workflow_id))?;
        self.executions
            .lock()
            .unwrap()
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<WorkflowExecution>, RepositoryError> {
        Ok(self.executions.lock().unwrap().get(id).cloned())
    }

    async fn list_executions(
        &self,
        workflow_id: Option<&Uuid>,
        skip: u32,
        limit: u32,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        let mut items: Vec<WorkflowExecution> = self
            .executions
            .lock()
            .unwrap()
            .values()
            .filter(|e| workflow_id.is_none_or(|id| e.workflow_id == *id))
            .filter(|e| status.is_none_or(|s| e.status == s))
            .cloned()
            .collect();
        newest_first(&mut items, |e| (e.created_at, e.id));
        Ok(page(items, skip, limit))
    }

    async fn has_running_execution(&self, workflow_id: &Uuid) -> Result<bool, RepositoryError> {
        self.check("has_running_execution", Some(workflow_id))?;
        Ok(self
            .executions
            .lock()
            .unwrap()
            .values()
            .any(|e| e.workflow_id == *workflow_id && e.status == ExecutionStatus::Running))
    }

    async fn mark_execution_running(
        &self,
        id: &Uuid,
        started_at: DateTime<Utc>,
        log: &str,
    ) -> Result<bool, RepositoryError> {
        self.check("mark_execution_running", None)?;
        Ok(self.transition(id, ExecutionStatus::Pending, |e| {
            e.status = ExecutionStatus::Running;
            e.started_at = Some(started_at);
            e.logs = log.to_string();
        }))
    }

    async fn append_execution_log(&self, id: &Uuid, text: &str) -> Result<(), RepositoryError> {
        self.check("append_execution_log", None)?;
        if let Some(e) = self.executions.lock().unwrap().get_mut(id) {
            e.logs.push_str(text);
        }
        Ok(())
    }

    async fn complete_execution(
        &self,
        id: &Uuid,
        result: &Value,
        completed_at: DateTime<Utc>,
        duration: f64,
    ) -> Result<bool, RepositoryError> {
        self.check("complete_execution", None)?;
        Ok(self.transition(id, ExecutionStatus::Running, |e| {
            e.status = ExecutionStatus::Completed;
            e.result = Some(result.clone());
            e.completed_at = Some(completed_at);
            e.duration = Some(duration);
        }))
    }

    async fn fail_execution(
        &self,
        id: &Uuid,
        error: &str,
        completed_at: DateTime<Utc>,
        duration: f64,
    ) -> Result<bool, RepositoryError> {
        self.check("fail_execution", None)?;
        Ok(self.transition(id, ExecutionStatus::Running, |e| {
            e.status = ExecutionStatus::Failed;
            e.error_message = Some(error.to_string());
            e.completed_at = Some(completed_at);
            e.duration = Some(duration);
        }))
    }

    async fn cancel_execution(
        &self,
        id: &Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.check("cancel_execution", None)?;
        let mut executions = self.executions.lock().unwrap();
        match executions.get_mut(id) {
            Some(e) if !e.status.is_terminal() => {
                e.status = ExecutionStatus::Cancelled;
                e.completed_at = Some(completed_at);
                e.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_running_executions(
        &self,
        workflow_id: &Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut count = 0;
        for e in self.executions.lock().unwrap().values_mut() {
            if e.workflow_id == *workflow_id && e.status == ExecutionStatus::Running {
                e.status = ExecutionStatus::Cancelled;
                e.completed_at = Some(completed_at);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn cancel_interrupted_executions(
        &self,
        completed_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut count = 0;
        for e in self.executions.lock().unwrap().values_mut() {
            if matches!(e.status, ExecutionStatus::Pending | ExecutionStatus::Running) {
                e.status = ExecutionStatus::Cancelled;
                e.completed_at = Some(completed_at);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn prune_executions(&self, workflow_id: &Uuid, keep: u32) -> Result<u64, RepositoryError> {
        self.check("prune_executions", Some(workflow_id))?;
        let mut executions = self.executions.lock().unwrap();
        let mut owned: Vec<&WorkflowExecution> = executions
            .values()
            .filter(|e| e.workflow_id == *workflow_id)
            .collect();
        newest_first(&mut owned, |e| (e.created_at, e.id));
        let doomed: Vec<Uuid> = owned
            .iter()
            .skip(keep as usize)
            .filter(|e| e.status.is_terminal())
            .map(|e| e.id)
            .collect();
        for id in &doomed {
            executions.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// MemoryFileRepository
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryFileRepository {
    files: Mutex<HashMap<Uuid, FileRecord>>,
}

impl FileRepository for MemoryFileRepository {
    async fn create_file(&self, file: &FileRecord) -> Result<(), RepositoryError> {
        self.files.lock().unwrap().insert(file.id, file.clone());
        Ok(())
    }

    async fn get_file(&self, id: &Uuid) -> Result<Option<FileRecord>, RepositoryError> {
        Ok(self.files.lock().unwrap().get(id).cloned())
    }

    async fn list_files(
        &self,
        skip: u32,
        limit: u32,
        status: Option<FileStatus>,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let mut items: Vec<FileRecord> = self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|f| status.is_none_or(|s| f.status == s))
            .cloned()
            .collect();
        newest_first(&mut items, |f| (f.created_at, f.id));
        Ok(page(items, skip, limit))
    }

    async fn update_file_status(
        &self,
        id: &Uuid,
        status: FileStatus,
        content: Option<&str>,
        metadata: Option<&Value>,
        error: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let mut files = self.files.lock().unwrap();
        let Some(file) = files.get_mut(id) else {
            return Ok(false);
        };
        let now = Utc::now();
        file.status = status;
        match status {
            FileStatus::Processing => file.processing_started_at = Some(now),
            FileStatus::Processed | FileStatus::Failed => file.processing_completed_at = Some(now),
            _ => {}
        }
        if let Some(content) = content {
            file.content = Some(content.to_string());
        }
        if let Some(metadata) = metadata {
            file.metadata = metadata.clone();
        }
        if let Some(error) = error {
            file.processing_error = Some(error.to_string());
        }
        file.updated_at = now;
        Ok(true)
    }

    async fn file_stats(&self, since: DateTime<Utc>) -> Result<FileStats, RepositoryError> {
        let files = self.files.lock().unwrap();
        let mut status_breakdown = BTreeMap::new();
        for status in FileStatus::ALL {
            let n = files.values().filter(|f| f.status == status).count() as i64;
            status_breakdown.insert(status.as_str().to_string(), n);
        }
        Ok(FileStats {
            total_files: files.len() as i64,
            status_breakdown,
            total_size_bytes: files.values().map(|f| f.file_size).sum(),
            recent_uploads_24h: files.values().filter(|f| f.created_at >= since).count() as i64,
        })
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Extractor returning a fixed outcome for every path.
pub struct StaticExtractor {
    outcome: Extraction,
}

impl StaticExtractor {
    pub fn content(text: &str) -> Self {
        Self {
            outcome: Extraction::Content {
                content: text.to_string(),
                metadata: json!({ "char_count": text.chars().count() }),
            },
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            outcome: Extraction::Error {
                error: message.to_string(),
                metadata: json!({}),
            },
        }
    }
}

impl ContentExtractor for StaticExtractor {
    async fn extract(&self, _file_path: &str) -> Extraction {
        self.outcome.clone()
    }
}

#[derive(Debug, Clone)]
pub struct RecordCall {
    pub table: String,
    pub record_id: Option<String>,
    pub fields: Map<String, Value>,
}

/// Record store that remembers every call and hands out `rec1`, `rec2`, ...
#[derive(Default)]
pub struct RecordingRecordStore {
    calls: Mutex<Vec<RecordCall>>,
    fail: bool,
}

impl RecordingRecordStore {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::default(),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<RecordCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl RecordStoreClient for RecordingRecordStore {
    async fn create_record(
        &self,
        table: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, RecordStoreError> {
        if self.fail {
            return Err(RecordStoreError::Request("connection refused".to_string()));
        }
        let mut calls = self.calls.lock().unwrap();
        calls.push(RecordCall {
            table: table.to_string(),
            record_id: None,
            fields: fields.clone(),
        });
        Ok(format!("rec{}", calls.len()))
    }

    async fn update_record(
        &self,
        table: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), RecordStoreError> {
        if self.fail {
            return Err(RecordStoreError::Api {
                status: 404,
                message: "record not found".to_string(),
            });
        }
        self.calls.lock().unwrap().push(RecordCall {
            table: table.to_string(),
            record_id: Some(record_id.to_string()),
            fields: fields.clone(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub type MemoryCoordinator = ExecutionCoordinator<
    MemoryWorkflowRepository,
    MemoryFileRepository,
    StaticExtractor,
    RecordingRecordStore,
>;

pub type TestDetector = TriggerDetector<
    MemoryWorkflowRepository,
    MemoryFileRepository,
    StaticExtractor,
    RecordingRecordStore,
>;

pub type TestService = WorkflowService<
    MemoryWorkflowRepository,
    MemoryFileRepository,
    StaticExtractor,
    RecordingRecordStore,
>;

pub struct TestCoordinator {
    pub workflows: Arc<MemoryWorkflowRepository>,
    pub files: Arc<MemoryFileRepository>,
    pub coordinator: Arc<MemoryCoordinator>,
}

impl TestCoordinator {
    /// Poll until the execution reaches `status`.
    pub async fn wait_for_status(&self, id: &Uuid, status: ExecutionStatus) -> WorkflowExecution {
        for _ in 0..500 {
            if let Some(exec) = self.workflows.get_execution(id).await.unwrap() {
                if exec.status == status {
                    return exec;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("execution {id} never reached {status}");
    }
}

pub fn memory_coordinator() -> TestCoordinator {
    let workflows = Arc::new(MemoryWorkflowRepository::default());
    let files = Arc::new(MemoryFileRepository::default());
    let coordinator = Arc::new(ExecutionCoordinator::new(
        workflows.clone(),
        files.clone(),
        Arc::new(StaticExtractor::content("extracted text")),
        Arc::new(RecordingRecordStore::default()),
    ));
    TestCoordinator {
        workflows,
        files,
        coordinator,
    }
}

/// Poll until the execution reaches any terminal status.
pub async fn wait_for_terminal(
    workflows: &MemoryWorkflowRepository,
    id: &Uuid,
) -> WorkflowExecution {
    for _ in 0..500 {
        if let Some(exec) = workflows.get_execution(id).await.unwrap() {
            if exec.status.is_terminal() {
                return exec;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("execution {id} never finished");
}
