//! HTTP request handlers for the REST API.

pub mod cron;
pub mod execution;
pub mod file;
pub mod scheduler;
pub mod stats;
pub mod workflow;
