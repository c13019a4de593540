//! Per-run execution context with `{key}` placeholder substitution.
//!
//! The context is an insertion-ordered list of named JSON values seeded with
//! the run's identity and trigger payload, then extended with each step's
//! result as `step_{n}_result`.
//!
//! Substitution makes exactly one pass over the entries in insertion order.
//! For every entry holding a scalar (string, number, bool) each literal
//! `{key}` in the text is replaced by the stringified value. Objects, arrays
//! and null are never substituted. Because the pass is sequential, text
//! produced by an earlier replacement can itself be matched by a later key.

use autoflow_types::execution::WorkflowExecution;
use autoflow_types::file::FileRecord;
use serde_json::{Map, Value, json};

/// Mutable state shared by the steps of one run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    entries: Vec<(String, Value)>,
}

impl ExecutionContext {
    /// Seed a context from an execution and, when the run was file
    /// triggered, the already-fetched file record.
    pub fn for_execution(execution: &WorkflowExecution, file: Option<&FileRecord>) -> Self {
        let mut ctx = Self::default();
        ctx.set("workflow_id", json!(execution.workflow_id.to_string()));
        ctx.set("execution_id", json!(execution.id.to_string()));
        ctx.set("trigger_data", execution.trigger_data.clone());
        ctx.set(
            "triggered_file_id",
            execution
                .triggered_file_id
                .map(|id| json!(id.to_string()))
                .unwrap_or(Value::Null),
        );
        if let Some(file) = file {
            ctx.set(
                "file",
                json!({
                    "id": file.id.to_string(),
                    "filename": file.original_filename,
                    "content": file.content,
                    "metadata": file.metadata,
                }),
            );
        }
        ctx
    }

    /// Insert or replace a value. Replacing keeps the original position.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Replace `{key}` placeholders in `template`.
    pub fn substitute(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (key, value) in &self.entries {
            let Some(text) = scalar_text(value) else {
                continue;
            };
            let placeholder = format!("{{{key}}}");
            if out.contains(&placeholder) {
                out = out.replace(&placeholder, &text);
            }
        }
        out
    }

    /// Substitute string values; other JSON values pass through unchanged.
    pub fn substitute_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.substitute(s)),
            other => other.clone(),
        }
    }

    /// Substitute every string value of a field map (one level deep).
    pub fn substitute_fields(&self, fields: &Map<String, Value>) -> Map<String, Value> {
        fields
            .iter()
            .map(|(k, v)| (k.clone(), self.substitute_value(v)))
            .collect()
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Stringify an operand for comparison: strings verbatim, null as empty,
/// everything else as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
