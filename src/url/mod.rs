//! URL handling module for PDF-Trawler
//!
//! This module provides start-URL normalization, the host allow-list, the
//! rules that decide which discovered links are worth crawling, and the
//! on-disk folder layout derived from a site's host.

mod domain;
mod normalize;

use std::collections::HashSet;
use url::Url;

// Re-export main functions
pub use domain::{derive_download_directory, netloc, sanitize_path_segment};
pub use normalize::normalize_start_url;

/// Path suffixes that never lead to crawlable content
const SKIPPED_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".css", ".js", ".ico", ".svg", ".woff", ".ttf", ".mp4",
    ".mp3",
];

/// Set of hosts a crawl may visit
///
/// Entries are compared case-insensitively against both the `host:port` and
/// the bare host of a URL. An entry written as `host:port` also admits `host`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedHosts {
    hosts: HashSet<String>,
}

impl AllowedHosts {
    /// Builds an allow-list from host entries
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed = HashSet::new();
        for host in hosts {
            let lowered = host.as_ref().trim().to_lowercase();
            if lowered.is_empty() {
                continue;
            }
            if let Some((bare, _)) = lowered.split_once(':') {
                allowed.insert(bare.to_string());
            }
            allowed.insert(lowered);
        }
        Self { hosts: allowed }
    }

    /// Allow-list restricting a crawl to the start URL's own host
    ///
    /// # Examples
    ///
    /// ```
    /// use url::Url;
    /// use pdf_trawler::url::AllowedHosts;
    ///
    /// let start = Url::parse("http://example.com:8080/").unwrap();
    /// let allowed = AllowedHosts::for_start_url(&start);
    /// assert!(allowed.permits(&Url::parse("http://example.com:8080/a").unwrap()));
    /// assert!(!allowed.permits(&Url::parse("http://other.com/").unwrap()));
    /// ```
    pub fn for_start_url(start_url: &Url) -> Self {
        let mut hosts = vec![netloc(start_url)];
        if let Some(host) = start_url.host_str() {
            hosts.push(host.to_string());
        }
        Self::new(hosts)
    }

    /// Returns true if either the netloc or the hostname of `url` is allowed
    pub fn permits(&self, url: &Url) -> bool {
        let hostname = url.host_str().unwrap_or_default().to_lowercase();
        self.hosts.contains(&netloc(url)) || self.hosts.contains(&hostname)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Allowed entries in sorted order
    pub fn entries(&self) -> Vec<&str> {
        let mut entries: Vec<&str> = self.hosts.iter().map(|h| h.as_str()).collect();
        entries.sort_unstable();
        entries
    }
}

/// Returns true if the URL path ends in `.pdf` (case-insensitive)
pub fn is_pdf_path(url: &Url) -> bool {
    url.path().to_lowercase().ends_with(".pdf")
}

/// Returns true if the URL path points at a watermarking `download.php` endpoint
pub fn is_watermark_download_path(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    path.contains("watermark") && path.contains("download.php")
}

/// Returns true if the URL path ends in an image, stylesheet, script, font or media suffix
pub fn has_skipped_extension(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Decides whether a resolved link should join the crawl frontier
///
/// PDFs and watermark downloads are excluded because the extractors handle
/// them; static assets are excluded because they carry no links.
pub fn is_crawlable_link(url: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    !(is_pdf_path(url) || is_watermark_download_path(url) || has_skipped_extension(url))
}
