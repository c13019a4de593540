//! Shared domain types for Autoflow.
//!
//! This crate contains the core domain types used across the workflow engine:
//! Workflow, WorkflowExecution, FileRecord, the step and trigger vocabularies,
//! global configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod execution;
pub mod file;
pub mod workflow;
