//! Infrastructure layer for Autoflow.
//!
//! Contains implementations of the traits defined in `autoflow-core`:
//! SQLite storage, local content extraction, the Airtable record-store
//! client, and the `config.toml` loader.

pub mod config;
pub mod record_store;
pub mod sqlite;
pub mod storage;
