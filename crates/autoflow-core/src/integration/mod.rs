//! External collaborators the step interpreter calls out to.
//!
//! Implementations live in autoflow-infra: a content extractor for uploaded
//! files and a client for the tabular record store.

pub mod extractor;
pub mod record_store;
