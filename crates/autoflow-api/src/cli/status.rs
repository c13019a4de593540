//! System status dashboard command.

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// Display system status dashboard.
///
/// Shows workflow, execution and file counts, the effective scheduler
/// settings and where data lives.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let workflows = state.workflow_service.stats().await?;
    let files = state.file_service.stats().await?;
    let config = &state.config;
    let record_store_configured =
        config.record_store.api_key.is_some() && config.record_store.base_id.is_some();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "upload_dir": state.upload_dir.display().to_string(),
            "workflows": workflows,
            "files": files,
            "scheduler": {
                "interval_secs": config.scheduler_interval_secs,
                "max_workflow_executions": config.max_workflow_executions,
                "execution_timeout_secs": config.execution_timeout_secs,
            },
            "record_store": if record_store_configured { "configured" } else { "dry_run" },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let count = |map: &std::collections::BTreeMap<String, i64>, key: &str| {
        map.get(key).copied().unwrap_or(0)
    };

    println!();
    println!(
        "  {} Autoflow v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Workflows ──").dim());
    println!("  Total:    {}", style(workflows.total_workflows).bold());
    println!(
        "  Active:   {}",
        style(count(&workflows.workflow_status_breakdown, "active")).green()
    );
    let paused = count(&workflows.workflow_status_breakdown, "paused");
    if paused > 0 {
        println!("  Paused:   {}", style(paused).yellow());
    }
    let inactive = count(&workflows.workflow_status_breakdown, "inactive");
    if inactive > 0 {
        println!("  Inactive: {}", style(inactive).dim());
    }
    println!();

    println!("  {}", style("── Executions ──").dim());
    println!("  Total:     {}", style(workflows.total_executions).bold());
    println!("  Last 24h:  {}", workflows.recent_executions_24h);
    let breakdown = &workflows.execution_status_breakdown;
    println!(
        "  Completed: {}  Failed: {}  Cancelled: {}",
        style(count(breakdown, "completed")).green(),
        style(count(breakdown, "failed")).red(),
        style(count(breakdown, "cancelled")).yellow()
    );
    let in_flight = count(breakdown, "pending") + count(breakdown, "running");
    if in_flight > 0 {
        println!("  In flight: {}", style(in_flight).blue());
    }
    println!();

    println!("  {}", style("── Files ──").dim());
    println!("  Total:    {}", style(files.total_files).bold());
    println!("  Size:     {}", format_bytes(files.total_size_bytes));
    println!("  Last 24h: {}", files.recent_uploads_24h);
    println!();

    println!("  {}", style("── Scheduler ──").dim());
    println!("  Interval:  {}s", config.scheduler_interval_secs);
    println!(
        "  Retention: {} executions per workflow",
        config.max_workflow_executions
    );
    println!(
        "  Timeout:   {}s {}",
        config.execution_timeout_secs,
        style("(not enforced)").dim()
    );
    println!(
        "  Records:   {}",
        if record_store_configured {
            style("Airtable").green()
        } else {
            style("dry-run (no credentials)").yellow()
        }
    );
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Uploads:  {}", style(state.upload_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!();

    Ok(())
}

fn format_bytes(n: i64) -> String {
    const KIB: f64 = 1024.0;
    let n_f = n as f64;
    if n_f >= KIB * KIB * KIB {
        format!("{:.1} GiB", n_f / (KIB * KIB * KIB))
    } else if n_f >= KIB * KIB {
        format!("{:.1} MiB", n_f / (KIB * KIB))
    } else if n_f >= KIB {
        format!("{:.1} KiB", n_f / KIB)
    } else {
        format!("{n} B")
    }
}
