//! Local file content handling.

pub mod extractor;
