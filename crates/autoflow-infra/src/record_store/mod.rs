//! Record-store clients.

pub mod airtable;
