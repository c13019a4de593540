//! Plain-text content extractor.
//!
//! Reads text formats straight from disk. Binary document formats (PDF, Office,
//! spreadsheets) are reported as unsupported so that a dedicated extractor can
//! be slotted in behind the same trait.

use std::path::Path;

use autoflow_core::integration::extractor::ContentExtractor;
use autoflow_types::file::Extraction;
use serde_json::json;

/// Extensions read as text.
pub const TEXT_EXTENSIONS: &[&str] = &[".txt", ".md", ".csv", ".json", ".log"];

/// [`ContentExtractor`] for local plain-text files.
#[derive(Debug, Default, Clone)]
pub struct LocalTextExtractor;

impl LocalTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// UTF-8 first, then Latin-1, which maps every byte to a char and so never fails.
fn decode_text(bytes: Vec<u8>) -> (String, &'static str) {
    match String::from_utf8(bytes) {
        Ok(text) => (text, "utf-8"),
        Err(e) => {
            let text = e.into_bytes().iter().map(|&b| char::from(b)).collect();
            (text, "latin-1")
        }
    }
}

impl ContentExtractor for LocalTextExtractor {
    async fn extract(&self, file_path: &str) -> Extraction {
        let path = Path::new(file_path);
        let extension = extension_of(path);

        if !TEXT_EXTENSIONS.contains(&extension.as_str()) {
            return Extraction::Error {
                error: format!("Unsupported file type: {extension}"),
                metadata: json!({ "file_type": extension }),
            };
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Extraction::Error {
                    error: "File not found".to_string(),
                    metadata: json!({}),
                };
            }
            Err(e) => {
                tracing::error!(path = %file_path, error = %e, "failed to read file for extraction");
                return Extraction::Error {
                    error: format!("Extraction failed: {e}"),
                    metadata: json!({ "file_type": extension }),
                };
            }
        };

        let (content, encoding) = decode_text(bytes);
        let line_count = if content.is_empty() {
            0
        } else {
            content.matches('\n').count() + 1
        };

        Extraction::Content {
            metadata: json!({
                "file_type": extension,
                "encoding": encoding,
                "character_count": content.chars().count(),
                "line_count": line_count,
            }),
            content,
        }
    }
}
