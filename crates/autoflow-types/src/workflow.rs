//! Workflow domain types.
//!
//! A workflow is a named, ordered list of steps with an optional cron
//! schedule and a list of file-event trigger rules. Steps are stored as raw
//! JSON so that a definition written against an unknown step kind can still be
//! persisted and reported at run time; [`StepSpec::decode`] turns one raw step
//! into the closed [`StepKind`] union.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WorkflowStatus
// ---------------------------------------------------------------------------

/// Administrative status of a workflow. Only `Active` workflows are scheduled
/// or triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    Inactive,
    Paused,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 3] = [
        WorkflowStatus::Active,
        WorkflowStatus::Inactive,
        WorkflowStatus::Paused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Active => "active",
            WorkflowStatus::Inactive => "inactive",
            WorkflowStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(WorkflowStatus::Active),
            "inactive" => Ok(WorkflowStatus::Inactive),
            "paused" => Ok(WorkflowStatus::Paused),
            other => Err(other.to_string()),
        }
    }
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        WorkflowStatus::Active
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Step list of a workflow, kept as raw JSON objects in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub steps: Vec<Value>,
}

impl WorkflowConfig {
    pub fn new(steps: Vec<Value>) -> Self {
        Self { steps }
    }
}

/// A persisted workflow definition plus its running counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// UUIDv7 workflow ID.
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub config: WorkflowConfig,
    #[serde(default)]
    pub triggers: Vec<TriggerRule>,
    /// Standard 5-field cron expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    pub status: WorkflowStatus,
    /// Gate independent of `status`.
    pub is_enabled: bool,
    pub next_run: Option<DateTime<Utc>>,
    pub execution_count: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_execution_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Build a fresh, active, enabled workflow with zeroed counters.
    pub fn new(request: CreateWorkflowRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: request.name,
            description: request.description,
            config: request.config,
            triggers: request.triggers,
            cron_expression: request.cron_expression,
            status: WorkflowStatus::Active,
            is_enabled: true,
            next_run: None,
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            last_execution_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether manual and event triggers may start a run right now.
    pub fn is_runnable(&self) -> bool {
        self.status == WorkflowStatus::Active && self.is_enabled
    }
}

/// Request body for creating a workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: WorkflowConfig,
    #[serde(default)]
    pub triggers: Vec<TriggerRule>,
    #[serde(default)]
    pub cron_expression: Option<String>,
}

/// Partial update. `None` leaves the field untouched; an empty
/// `cron_expression` clears the schedule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub config: Option<WorkflowConfig>,
    pub triggers: Option<Vec<TriggerRule>>,
    pub cron_expression: Option<String>,
    /// Raw status string, validated by the service.
    pub status: Option<String>,
    pub is_enabled: Option<bool>,
}

// ---------------------------------------------------------------------------
// Trigger rules
// ---------------------------------------------------------------------------

/// An event-matching rule. Absent conditions always pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerRule {
    /// Event kind this rule reacts to (`file_upload`, `file_processed`).
    #[serde(rename = "type")]
    pub event: String,
    /// Accepted extensions, e.g. `[".pdf", ".csv"]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extensions: Option<Vec<String>>,
    /// Inclusive size ceiling in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_types: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Every step kind the interpreter understands, by wire name.
pub const STEP_KINDS: &[&str] = &[
    "log",
    "file_process",
    "airtable_create",
    "airtable_update",
    "delay",
    "condition",
];

/// A decoded step: common fields plus the kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Keep going after this step fails.
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(flatten)]
    pub kind: StepKind,
}

/// Closed set of step kinds, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Log {
        #[serde(default = "default_log_message")]
        message: String,
    },
    FileProcess {
        /// Falls back to the execution's triggering file.
        #[serde(default)]
        file_id: Option<Uuid>,
    },
    AirtableCreate {
        table: String,
        #[serde(default)]
        fields: Map<String, Value>,
    },
    AirtableUpdate {
        table: String,
        record_id: String,
        #[serde(default)]
        fields: Map<String, Value>,
    },
    Delay {
        /// Seconds.
        #[serde(default = "default_delay_secs")]
        delay: f64,
    },
    Condition {
        #[serde(default)]
        condition: ConditionSpec,
    },
}

fn default_log_message() -> String {
    "Log step executed".to_string()
}

fn default_delay_secs() -> f64 {
    1.0
}

/// Operands and operator of a `condition` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    /// One of `equals`, `not_equals`, `contains`, `not_contains`. Anything
    /// else evaluates to false.
    #[serde(rename = "type", default = "default_condition_type")]
    pub operator: String,
    #[serde(default)]
    pub left: Value,
    #[serde(default)]
    pub right: Value,
}

fn default_condition_type() -> String {
    "equals".to_string()
}

impl Default for ConditionSpec {
    fn default() -> Self {
        Self {
            operator: default_condition_type(),
            left: Value::Null,
            right: Value::Null,
        }
    }
}

/// Why a raw step could not be decoded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepDecodeError {
    #[error("step has no type")]
    MissingType,

    #[error("unknown step type: {0}")]
    UnknownType(String),

    #[error("invalid {kind} step: {reason}")]
    Invalid { kind: String, reason: String },
}

impl StepSpec {
    /// Decode one raw step. Unknown kinds are reported by name before any
    /// field-level decoding is attempted.
    pub fn decode(raw: &Value) -> Result<StepSpec, StepDecodeError> {
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or(StepDecodeError::MissingType)?;

        if !STEP_KINDS.contains(&kind) {
            return Err(StepDecodeError::UnknownType(kind.to_string()));
        }

        serde_json::from_value(raw.clone()).map_err(|e| StepDecodeError::Invalid {
            kind: kind.to_string(),
            reason: e.to_string(),
        })
    }

    /// Display name, defaulting to `Step {number}` (1-based).
    pub fn display_name(&self, number: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Step {number}"))
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Aggregate counts across workflows and executions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub total_workflows: i64,
    pub workflow_status_breakdown: BTreeMap<String, i64>,
    pub total_executions: i64,
    pub execution_status_breakdown: BTreeMap<String, i64>,
    pub recent_executions_24h: i64,
}
