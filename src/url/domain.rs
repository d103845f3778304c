use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use url::Url;

/// Returns the `host[:port]` part of a URL, lower-cased
///
/// The port is only present when it was written explicitly and differs from
/// the scheme default.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use pdf_trawler::url::netloc;
///
/// let url = Url::parse("https://EXAMPLE.com:8443/path").unwrap();
/// assert_eq!(netloc(&url), "example.com:8443");
/// ```
pub fn netloc(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}

/// Derives the per-site download folder for a crawl
///
/// The folder is `root/<host>` or `root/<host>_<port>`, passed through
/// [`sanitize_path_segment`]. `Url` parsing drops a port equal to the scheme
/// default, so `https://x:443/` and `https://x/` share the folder `x`.
pub fn derive_download_directory(root: &Path, start_url: &Url) -> PathBuf {
    let host = start_url
        .host_str()
        .map(|h| h.to_lowercase())
        .unwrap_or_else(|| start_url.as_str().to_string());

    let key = match start_url.port() {
        Some(port) => format!("{}_{}", host, port),
        None => host,
    };

    root.join(sanitize_path_segment(&key))
}

fn unsafe_segment_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("segment pattern is valid"))
}

/// Makes a string safe to use as a single directory name
pub fn sanitize_path_segment(value: &str) -> String {
    let replaced = unsafe_segment_chars().replace_all(value, "_");
    let trimmed = replaced.trim_matches(&['.', '_', '-'][..]);
    if trimmed.is_empty() {
        "site".to_string()
    } else {
        trimmed.to_string()
    }
}
