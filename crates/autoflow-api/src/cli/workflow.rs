//! CLI workflow management subcommands.
//!
//! Provides list, show, create, trigger, runs, cancel and delete operations
//! for workflows and their executions. Commands run against the local
//! database directly; `trigger` executes the run in this process and waits
//! for it to finish.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use autoflow_core::service::DEFAULT_PAGE_LIMIT;
use autoflow_types::execution::{ExecutionStatus, WorkflowExecution};
use autoflow_types::workflow::{CreateWorkflowRequest, Workflow, WorkflowStatus};

use crate::state::AppState;

/// Workflow management subcommands.
#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// List workflows, newest first.
    #[command(alias = "ls")]
    List {
        /// Filter by status (active, inactive, paused).
        #[arg(long)]
        status: Option<String>,

        #[arg(long, default_value_t = 0)]
        skip: u32,

        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        limit: u32,
    },

    /// Show one workflow with its steps and triggers.
    Show {
        /// Workflow ID.
        id: String,
    },

    /// Create a workflow from a JSON definition file.
    Create {
        /// Path to a JSON file with name, config, triggers and cron_expression.
        file: PathBuf,
    },

    /// Run a workflow now and wait for it to finish.
    Trigger {
        /// Workflow ID.
        id: String,

        /// Optional JSON trigger data.
        #[arg(long)]
        payload: Option<String>,
    },

    /// List executions, optionally for one workflow.
    Runs {
        /// Workflow ID (omit for all workflows).
        id: Option<String>,

        /// Filter by status (pending, running, completed, failed, cancelled).
        #[arg(long)]
        status: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Show one execution including its log.
    Logs {
        /// Execution ID.
        execution_id: String,
    },

    /// Cancel a running execution.
    Cancel {
        /// Execution ID.
        execution_id: String,
    },

    /// Delete a workflow and all of its executions.
    #[command(alias = "rm")]
    Delete {
        /// Workflow ID.
        id: String,
    },
}

/// Handle a workflow subcommand.
pub async fn handle_workflow_command(
    cmd: WorkflowCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        WorkflowCommand::List {
            status,
            skip,
            limit,
        } => handle_list(state, status.as_deref(), skip, limit, json).await,
        WorkflowCommand::Show { id } => handle_show(state, &id, json).await,
        WorkflowCommand::Create { file } => handle_create(state, &file, json).await,
        WorkflowCommand::Trigger { id, payload } => {
            handle_trigger(state, &id, payload.as_deref(), json).await
        }
        WorkflowCommand::Runs { id, status, limit } => {
            handle_runs(state, id.as_deref(), status.as_deref(), limit, json).await
        }
        WorkflowCommand::Logs { execution_id } => handle_logs(state, &execution_id, json).await,
        WorkflowCommand::Cancel { execution_id } => {
            handle_cancel(state, &execution_id, json).await
        }
        WorkflowCommand::Delete { id } => handle_delete(state, &id, json).await,
    }
}

// ---------------------------------------------------------------------------
// List / show
// ---------------------------------------------------------------------------

async fn handle_list(
    state: &AppState,
    status: Option<&str>,
    skip: u32,
    limit: u32,
    json: bool,
) -> Result<()> {
    let workflows = state.workflow_service.list(skip, limit, status).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!();
        println!("  No workflows found.");
        println!(
            "  Create one with: {}",
            style("autoflow workflow create <file.json>").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Status"),
            Cell::new("Schedule"),
            Cell::new("Next run"),
            Cell::new("Runs (ok/failed)"),
        ]);

    for wf in &workflows {
        table.add_row(vec![
            Cell::new(short_id(&wf.id)),
            Cell::new(&wf.name),
            workflow_status_cell(wf),
            Cell::new(wf.cron_expression.as_deref().unwrap_or("-")),
            Cell::new(
                wf.next_run
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(format!(
                "{} ({}/{})",
                wf.execution_count, wf.success_count, wf.failure_count
            )),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

async fn handle_show(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_id(id, "workflow")?;
    let wf = state.workflow_service.get(&id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&wf)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Workflow:").bold(), style(&wf.name).cyan());
    println!("  ID:          {}", wf.id);
    if let Some(ref desc) = wf.description {
        println!("  Description: {desc}");
    }
    println!("  Status:      {} (enabled: {})", wf.status, wf.is_enabled);
    println!(
        "  Schedule:    {}",
        wf.cron_expression.as_deref().unwrap_or("none")
    );
    if let Some(next) = wf.next_run {
        println!("  Next run:    {}", next.format("%Y-%m-%d %H:%M:%S"));
    }
    println!(
        "  Runs:        {} total, {} succeeded, {} failed",
        wf.execution_count, wf.success_count, wf.failure_count
    );
    if let Some(last) = wf.last_execution_at {
        println!("  Last run:    {}", last.format("%Y-%m-%d %H:%M:%S"));
    }

    println!();
    println!("  {}", style("── Steps ──").dim());
    if wf.config.steps.is_empty() {
        println!("  (none)");
    }
    for (i, step) in wf.config.steps.iter().enumerate() {
        let kind = step.get("type").and_then(|t| t.as_str()).unwrap_or("?");
        let name = step.get("name").and_then(|n| n.as_str()).unwrap_or("");
        println!("  {:>2}. {} {}", i + 1, style(kind).cyan(), name);
    }

    println!();
    println!("  {}", style("── Triggers ──").dim());
    if wf.triggers.is_empty() {
        println!("  (none)");
    }
    for rule in &wf.triggers {
        let mut conditions = Vec::new();
        if let Some(ref exts) = rule.file_extensions {
            conditions.push(format!("extensions {}", exts.join(",")));
        }
        if let Some(max) = rule.max_file_size {
            conditions.push(format!("size <= {max}"));
        }
        if let Some(ref mimes) = rule.mime_types {
            conditions.push(format!("mime {}", mimes.join(",")));
        }
        if conditions.is_empty() {
            println!("  - {}", rule.event);
        } else {
            println!("  - {} ({})", rule.event, conditions.join("; "));
        }
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Create / delete
// ---------------------------------------------------------------------------

async fn handle_create(state: &AppState, file: &Path, json: bool) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let request: CreateWorkflowRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid workflow definition in {}", file.display()))?;

    let wf = state.workflow_service.create(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&wf)?);
    } else {
        println!();
        println!(
            "  {} Created workflow '{}'",
            style("*").green().bold(),
            style(&wf.name).cyan()
        );
        println!("  ID: {}", wf.id);
        println!("  Steps: {}", wf.config.steps.len());
        println!("  Triggers: {}", wf.triggers.len());
        if let Some(ref cron) = wf.cron_expression {
            println!("  Schedule: {cron}");
        }
        println!();
    }

    Ok(())
}

async fn handle_delete(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_id(id, "workflow")?;
    let wf = state.workflow_service.get(&id).await?;
    state.workflow_service.delete(&id).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"deleted": true, "id": id.to_string(), "name": wf.name})
        );
    } else {
        println!();
        println!(
            "  {} Deleted workflow '{}'",
            style("*").green().bold(),
            style(&wf.name).cyan()
        );
        println!();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

async fn handle_trigger(
    state: &AppState,
    id: &str,
    payload: Option<&str>,
    json: bool,
) -> Result<()> {
    let id = parse_id(id, "workflow")?;
    let trigger_data = payload
        .map(|raw| serde_json::from_str::<serde_json::Value>(raw).context("Invalid JSON payload"))
        .transpose()?;

    let execution = state.workflow_service.trigger(&id, trigger_data).await?;
    if !json {
        println!();
        println!(
            "  {} Running execution {}",
            style("*").green().bold(),
            style(short_id(&execution.id)).cyan()
        );
    }

    // The run task lives in this process; leaving early would abandon it.
    tokio::select! {
        _ = state.coordinator.wait_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            state.coordinator.drain_all().await;
        }
    }

    let finished = state.workflow_service.execution(&execution.id).await?;
    display_execution(&finished, json)?;

    if finished.status == ExecutionStatus::Failed {
        bail!("Execution {} failed", finished.id);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Runs / logs / cancel
// ---------------------------------------------------------------------------

async fn handle_runs(
    state: &AppState,
    id: Option<&str>,
    status: Option<&str>,
    limit: u32,
    json: bool,
) -> Result<()> {
    let workflow_id = id.map(|raw| parse_id(raw, "workflow")).transpose()?;
    let runs = state
        .workflow_service
        .executions(workflow_id.as_ref(), 0, limit, status)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!();
        println!("  No executions found.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Execution").fg(Color::Cyan),
            Cell::new("Workflow"),
            Cell::new("Status"),
            Cell::new("Trigger"),
            Cell::new("Started"),
            Cell::new("Duration"),
        ]);

    for r in &runs {
        table.add_row(vec![
            Cell::new(short_id(&r.id)),
            Cell::new(short_id(&r.workflow_id)),
            execution_status_cell(r.status),
            Cell::new(r.trigger_type.as_str()),
            Cell::new(
                r.started_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(
                r.duration
                    .map(|d| format!("{d:.2}s"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

async fn handle_logs(state: &AppState, execution_id: &str, json: bool) -> Result<()> {
    let id = parse_id(execution_id, "execution")?;
    let execution = state.workflow_service.execution(&id).await?;
    display_execution(&execution, json)
}

async fn handle_cancel(state: &AppState, execution_id: &str, json: bool) -> Result<()> {
    let id = parse_id(execution_id, "execution")?;
    let cancelled = state.workflow_service.cancel_execution(&id).await?;
    let execution = state.workflow_service.execution(&id).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "execution_id": id.to_string(),
                "cancelled": cancelled,
                "status": execution.status,
            })
        );
        return Ok(());
    }

    println!();
    if cancelled {
        println!(
            "  {} Cancelled execution {}",
            style("*").green().bold(),
            style(short_id(&id)).cyan()
        );
    } else {
        println!(
            "  Execution {} was not running (status: {})",
            style(short_id(&id)).cyan(),
            execution.status
        );
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn display_execution(execution: &WorkflowExecution, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(execution)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("Execution:").bold(),
        style(execution.id).cyan()
    );
    println!("  Workflow: {}", execution.workflow_id);
    println!("  Status:   {}", styled_status(execution.status));
    println!("  Trigger:  {}", execution.trigger_type);
    if let Some(started) = execution.started_at {
        println!("  Started:  {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(duration) = execution.duration {
        println!("  Duration: {duration:.2}s");
    }
    if let Some(ref err) = execution.error_message {
        println!("  Error:    {}", style(err).red());
    }
    if let Some(ref result) = execution.result {
        println!();
        println!("  {}", style("── Result ──").dim());
        let pretty = serde_json::to_string_pretty(result)?;
        for line in pretty.lines() {
            println!("  {line}");
        }
    }
    if !execution.logs.is_empty() {
        println!();
        println!("  {}", style("── Log ──").dim());
        for line in execution.logs.lines() {
            println!("  {}", style(line).dim());
        }
    }
    println!();

    Ok(())
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid {what} ID: '{raw}'"))
}

fn short_id(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn workflow_status_cell(wf: &Workflow) -> Cell {
    if !wf.is_enabled {
        return Cell::new(format!("{} (disabled)", wf.status)).fg(Color::DarkGrey);
    }
    match wf.status {
        WorkflowStatus::Active => Cell::new("active").fg(Color::Green),
        WorkflowStatus::Paused => Cell::new("paused").fg(Color::Yellow),
        WorkflowStatus::Inactive => Cell::new("inactive").fg(Color::DarkGrey),
    }
}

fn execution_status_cell(status: ExecutionStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        ExecutionStatus::Pending => cell.fg(Color::Yellow),
        ExecutionStatus::Running => cell.fg(Color::Blue),
        ExecutionStatus::Completed => cell.fg(Color::Green),
        ExecutionStatus::Failed => cell.fg(Color::Red),
        ExecutionStatus::Cancelled => cell.fg(Color::DarkYellow),
    }
}

fn styled_status(status: ExecutionStatus) -> console::StyledObject<&'static str> {
    let s = style(status.as_str());
    match status {
        ExecutionStatus::Completed => s.green(),
        ExecutionStatus::Failed => s.red(),
        ExecutionStatus::Cancelled => s.yellow(),
        ExecutionStatus::Pending | ExecutionStatus::Running => s.blue(),
    }
}
