//! PDF payload sanitization and validation
//!
//! Some watermarking endpoints print diagnostic text before the document
//! itself. The sanitizer cuts everything ahead of the first `%PDF-` marker; the
//! validator then performs the signature/footer check.

/// PDF file signature
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// End-of-file marker that must appear near the end of a complete PDF
pub const PDF_EOF_MARKER: &[u8] = b"%%EOF";

/// Number of trailing bytes searched for [`PDF_EOF_MARKER`]
pub const EOF_SEARCH_WINDOW: usize = 1024;

/// Returns the payload starting at the first PDF signature
///
/// Returns `None` if the signature never occurs. Applying the function to its
/// own output returns the same bytes.
///
/// # Examples
///
/// ```
/// use pdf_trawler::pdf::extract_pdf_bytes;
///
/// let raw = b"Debug: ready\n%PDF-1.4\nbody\n%%EOF";
/// assert!(extract_pdf_bytes(raw).unwrap().starts_with(b"%PDF-1.4"));
/// assert!(extract_pdf_bytes(b"<html></html>").is_none());
/// ```
pub fn extract_pdf_bytes(raw: &[u8]) -> Option<&[u8]> {
    let start = find_subslice(raw, PDF_SIGNATURE)?;
    if start > 0 {
        tracing::info!("Stripped {} bytes of debug output", start);
    }
    Some(&raw[start..])
}

/// Performs the signature/footer check on PDF content
///
/// Content is accepted only if it is at least 5 bytes long, starts with
/// `%PDF-`, and contains `%%EOF` within its last 1024 bytes.
pub fn is_valid_pdf(content: &[u8]) -> bool {
    if content.len() < PDF_SIGNATURE.len() {
        return false;
    }

    if !content.starts_with(PDF_SIGNATURE) {
        return false;
    }

    let tail_start = content.len().saturating_sub(EOF_SEARCH_WINDOW);
    find_subslice(&content[tail_start..], PDF_EOF_MARKER).is_some()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
