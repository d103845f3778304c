//! Filename derivation for downloaded PDFs
//!
//! Every name written to disk goes through [`sanitize_filename`], and every
//! target path through [`unique_target_path`].

use chrono::Utc;
use md5::{Digest, Md5};
use sha1::Sha1;
use std::path::{Path, PathBuf};
use url::Url;

/// Maximum length of a sanitized name, in characters, before `.pdf` is appended
pub const MAX_STEM_CHARS: usize = 200;

/// Name used when a URL or path has no usable final segment
pub const FALLBACK_FILENAME: &str = "downloaded.pdf";

/// Query parameters consulted, in order, for a watermark download's name
const NAME_PARAMS: &[&str] = &["show", "file", "document", "pdf", "name", "title"];

/// Cleans a candidate filename for the filesystem
///
/// # Rules
///
/// 1. Percent-decode
/// 2. Strip one trailing `.pdf` (case-insensitive)
/// 3. Replace `<>:"/\|?*` and control characters with `_`
/// 4. Collapse runs of spaces and underscores to a single `_`
/// 5. Trim leading/trailing `.`, `_` and spaces
/// 6. Truncate to 200 characters
/// 7. Fall back to `document_<unix time>` if nothing is left
/// 8. Append `.pdf`
///
/// # Examples
///
/// ```
/// use pdf_trawler::pdf::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Annual Report 2024.pdf"), "Annual_Report_2024.pdf");
/// assert_eq!(sanitize_filename("Policy%2FLaptop"), "Policy_Laptop.pdf");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let decoded = percent_decode_lossy(name);
    let stem = strip_pdf_suffix(&decoded);

    let mut collapsed = String::with_capacity(stem.len());
    let mut in_run = false;
    for c in stem.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == ' ' || c == '_' {
            if !in_run {
                collapsed.push('_');
            }
            in_run = true;
        } else {
            collapsed.push(c);
            in_run = false;
        }
    }

    let trimmed = collapsed.trim_matches(&['.', '_', ' '][..]);
    let mut cleaned: String = trimmed.chars().take(MAX_STEM_CHARS).collect();

    if cleaned.is_empty() {
        cleaned = format!("document_{}", Utc::now().timestamp());
    }

    format!("{}.pdf", cleaned)
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}

fn percent_decode_lossy(value: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(value.as_bytes())).into_owned()
}

fn strip_pdf_suffix(name: &str) -> &str {
    let split = name.len().saturating_sub(4);
    match name.get(split..) {
        Some(suffix) if suffix.eq_ignore_ascii_case(".pdf") => &name[..split],
        _ => name,
    }
}

/// Picks a path inside `folder` for `name` that does not clash with an older download
///
/// If `folder/name` already exists, the name is disambiguated as
/// `{stem}_{first 10 hex chars of sha1(reference)}{ext}` (`.pdf` when the
/// name has no extension). The disambiguated path itself may exist from a
/// previous run; callers treat that as "already downloaded".
pub fn unique_target_path(folder: &Path, name: &str, reference: &str) -> PathBuf {
    let candidate = folder.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let extension = as_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_else(|| ".pdf".to_string());

    let digest = hex::encode(Sha1::digest(reference.as_bytes()));
    folder.join(format!("{}_{}{}", stem, &digest[..10], extension))
}

/// Filename for an onclick reference such as `pdf/Policies/Laptop.pdf`
pub fn onclick_filename(pdf_path: &str) -> String {
    let basename = pdf_path.rsplit('/').next().unwrap_or_default();
    if basename.is_empty() {
        sanitize_filename(FALLBACK_FILENAME)
    } else {
        sanitize_filename(basename)
    }
}

/// Filename for a direct PDF link, taken from the last path segment
pub fn direct_filename(url: &Url) -> String {
    let basename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if basename.is_empty() {
        sanitize_filename(FALLBACK_FILENAME)
    } else {
        sanitize_filename(basename)
    }
}

/// Filename for a watermark download URL
///
/// Uses the first non-empty value among the `show`, `file`, `document`,
/// `pdf`, `name` and `title` query parameters; otherwise
/// `watermark_<8 hex chars>.pdf` derived from the URL.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use pdf_trawler::pdf::watermark_filename;
///
/// let url = Url::parse(
///     "https://example.mil/watermark11/download.php?show=Nomination%20of%20Offrs",
/// ).unwrap();
/// assert_eq!(watermark_filename(&url), "Nomination_of_Offrs.pdf");
/// ```
pub fn watermark_filename(url: &Url) -> String {
    for key in NAME_PARAMS {
        let value = url
            .query_pairs()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.into_owned());
        if let Some(value) = value {
            return sanitize_filename(&value);
        }
    }

    format!("watermark_{}.pdf", short_hash(url.as_str()))
}

/// First 8 hex chars of the MD5 of `input`
fn short_hash(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    hex::encode(&digest[..4])
}

/// Parses the filename from a `Content-Disposition` header value
///
/// Handles both `filename*=UTF-8''name.pdf` and `filename="name.pdf"`.
pub fn content_disposition_filename(header: &str) -> Option<String> {
    if let Some(start) = header.find("filename*=") {
        let rest = &header[start + "filename*=".len()..];
        if let Some(quote_start) = rest.find("''") {
            let encoded = rest[quote_start + 2..].split(';').next().unwrap_or_default();
            if let Ok(decoded) = urlencoding::decode(encoded.trim()) {
                let filename = decoded.trim().trim_matches('"').to_string();
                if !filename.is_empty() {
                    return Some(filename);
                }
            }
        }
    }

    let start = header.find("filename=")?;
    let rest = &header[start + "filename=".len()..];
    let filename = if let Some(quoted) = rest.strip_prefix('"') {
        quoted.split('"').next()
    } else if let Some(quoted) = rest.strip_prefix('\'') {
        quoted.split('\'').next()
    } else {
        rest.split(';').next()
    }?;

    let filename = filename.trim();
    if filename.is_empty() {
        None
    } else {
        Some(filename.to_string())
    }
}
