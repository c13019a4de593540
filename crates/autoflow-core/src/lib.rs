//! Workflow engine and repository trait definitions for Autoflow.
//!
//! This crate defines the "ports" (repository and collaborator traits) that
//! the infrastructure layer implements, plus the engine that drives them:
//! cron evaluation, trigger detection, execution coordination, the step
//! interpreter and retention. It depends only on `autoflow-types` -- never on
//! `autoflow-infra` or any database/IO crate.

pub mod integration;
pub mod repository;
pub mod service;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
