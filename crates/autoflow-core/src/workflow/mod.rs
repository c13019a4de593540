//! Workflow engine: scheduling, coordination, and step interpretation.
//!
//! - `cron` -- 5-field cron validation and occurrence computation
//! - `context` -- Per-run context with `{key}` placeholder substitution
//! - `step_runner` -- Sequential step interpreter with continue-on-error
//! - `coordinator` -- In-flight run registry, spawn/cancel/drain, run lifecycle
//! - `file_trigger` -- File-event rule matching
//! - `detector` -- Cron trigger detection tick
//! - `retention` -- Execution history pruning
//! - `scheduler` -- Background loop driving detection and retention

pub mod context;
pub mod coordinator;
pub mod cron;
pub mod detector;
pub mod file_trigger;
pub mod retention;
pub mod scheduler;
pub mod step_runner;
