//! PDF handling module
//!
//! This module contains everything that deals with a PDF once its bytes are in
//! memory:
//! - Stripping diagnostic output some servers emit ahead of the document
//! - The `%PDF-` / `%%EOF` signature check
//! - Filename derivation, sanitization and collision-safe target paths

mod content;
mod filename;

pub use content::{extract_pdf_bytes, is_valid_pdf, EOF_SEARCH_WINDOW, PDF_EOF_MARKER, PDF_SIGNATURE};
pub use filename::{
    content_disposition_filename, direct_filename, onclick_filename, sanitize_filename,
    unique_target_path, watermark_filename, FALLBACK_FILENAME, MAX_STEM_CHARS,
};
