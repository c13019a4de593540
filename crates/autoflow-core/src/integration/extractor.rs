//! Content extraction port.

use autoflow_types::file::Extraction;

/// Extracts text content and metadata from a stored file.
///
/// Format-specific parsing is entirely the implementor's concern. Failures
/// are reported as [`Extraction::Error`] rather than as a `Result` so that the
/// caller can persist the error metadata alongside the file record.
pub trait ContentExtractor: Send + Sync {
    fn extract(
        &self,
        file_path: &str,
    ) -> impl std::future::Future<Output = Extraction> + Send;
}
