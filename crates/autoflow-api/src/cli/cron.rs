//! `autoflow cron` subcommands.

use anyhow::{Result, bail};
use chrono::{Local, Utc};
use clap::Subcommand;
use console::style;

use autoflow_core::service::workflow::preview_cron;
use autoflow_core::workflow::cron::PREVIEW_COUNT;

#[derive(Subcommand)]
pub enum CronCommand {
    /// Validate a 5-field cron expression and preview its next runs.
    Check {
        /// Expression, e.g. "*/5 * * * *" (quote it).
        expression: String,

        /// Number of upcoming runs to show.
        #[arg(short = 'n', long, default_value_t = PREVIEW_COUNT)]
        count: usize,
    },
}

pub fn handle_cron_command(cmd: CronCommand, json: bool) -> Result<()> {
    match cmd {
        CronCommand::Check { expression, count } => check(&expression, count, json),
    }
}

fn check(expression: &str, count: usize, json: bool) -> Result<()> {
    let preview = preview_cron(expression.trim(), count, Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
    } else if preview.valid {
        println!();
        println!(
            "  {} '{}' is valid",
            style("✓").green(),
            style(&preview.expression).cyan()
        );
        println!();
        println!("  {}", style("── Next runs ──").dim());
        for (i, at) in preview.next_runs.iter().enumerate() {
            println!(
                "  {:>2}. {}  {}",
                i + 1,
                at.format("%Y-%m-%d %H:%M UTC"),
                style(at.with_timezone(&Local).format("(%H:%M local)")).dim()
            );
        }
        println!();
    }

    if !preview.valid {
        bail!(
            "{}",
            preview
                .error
                .unwrap_or_else(|| format!("invalid cron expression: '{expression}'"))
        );
    }
    Ok(())
}
