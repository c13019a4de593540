//! Record-store client port (a tabular-data API such as Airtable).

use serde_json::{Map, Value};

/// Errors from record-store calls. Surfaced as step failures.
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("record store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Response(String),
}

pub trait RecordStoreClient: Send + Sync {
    /// Create a record, returning its ID.
    fn create_record(
        &self,
        table: &str,
        fields: &Map<String, Value>,
    ) -> impl std::future::Future<Output = Result<String, RecordStoreError>> + Send;

    fn update_record(
        &self,
        table: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> impl std::future::Future<Output = Result<(), RecordStoreError>> + Send;
}
