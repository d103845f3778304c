//! PDF downloaders
//!
//! One pipeline serves all three discovery methods: derive a name, pick a
//! collision-safe path, short-circuit if the file is already there, fetch,
//! strip leading noise, validate, write. The method only changes how the
//! fetch URL and filename are derived, and whether the watermark-specific
//! checks run.

use crate::crawler::fetcher::{FetchError, FetchedResponse, Fetcher};
use crate::pdf::{
    content_disposition_filename, direct_filename, extract_pdf_bytes, is_valid_pdf,
    onclick_filename, sanitize_filename, unique_target_path, watermark_filename,
};
use crate::state::{DownloadRecord, PdfReference};
use crate::url::netloc;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Bytes of a watermark response inspected for an HTML error page
const HTML_SNIFF_LEN: usize = 200;

/// Reasons a single download is abandoned
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Could not build download URL: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Server returned an HTML page instead of a PDF")]
    HtmlInsteadOfPdf,

    #[error("No PDF signature in {0} byte response")]
    MissingSignature(usize),

    #[error("Content failed PDF validation")]
    InvalidPdf,

    #[error("Failed to write PDF: {0}")]
    Io(#[from] std::io::Error),
}

/// Request timeouts per download method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadTimeouts {
    /// Onclick and watermark-href downloads
    pub watermark: Duration,

    /// Direct `.pdf` downloads
    pub direct: Duration,
}

impl Default for DownloadTimeouts {
    fn default() -> Self {
        Self {
            watermark: Duration::from_secs(60),
            direct: Duration::from_secs(30),
        }
    }
}

/// Downloads PDF references into one destination folder
#[derive(Debug, Clone)]
pub struct Downloader<'a> {
    fetcher: &'a Fetcher,
    folder: PathBuf,
    timeouts: DownloadTimeouts,
    cancel: CancellationToken,
}

impl<'a> Downloader<'a> {
    pub fn new(fetcher: &'a Fetcher, folder: impl Into<PathBuf>, timeouts: DownloadTimeouts) -> Self {
        Self {
            fetcher,
            folder: folder.into(),
            timeouts,
            cancel: CancellationToken::new(),
        }
    }

    /// Aborts in-flight fetches once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Downloads a reference discovered on `source_page`
    ///
    /// Returns `None` when the download is abandoned; the reason is logged.
    pub async fn resolve(
        &self,
        reference: &PdfReference,
        source_page: &Url,
    ) -> Option<DownloadRecord> {
        match self.try_resolve(reference, source_page).await {
            Ok(record) => Some(record),
            Err(DownloadError::Fetch(err)) if err.is_cancelled() => {
                tracing::debug!("{}", err);
                None
            }
            Err(err) => {
                tracing::warn!("Skipping {} PDF {}: {}", reference.method(), reference.key(), err);
                None
            }
        }
    }

    async fn try_resolve(
        &self,
        reference: &PdfReference,
        source_page: &Url,
    ) -> Result<DownloadRecord, DownloadError> {
        let (fetch_url, name, timeout) = match reference {
            PdfReference::Onclick(path) => (
                onclick_download_url(path, source_page)?,
                onclick_filename(path),
                self.timeouts.watermark,
            ),
            PdfReference::WatermarkHref(url) => {
                (url.clone(), watermark_filename(url), self.timeouts.watermark)
            }
            PdfReference::Direct(url) => {
                (url.clone(), direct_filename(url), self.timeouts.direct)
            }
        };

        let key = reference.key();
        let target = unique_target_path(&self.folder, &name, key);
        if target.exists() {
            tracing::debug!("{} already on disk, skipping fetch", target.display());
            return Ok(self.record(reference, source_page, target, modified_at));
        }

        tracing::info!("Fetching {} PDF {} from {}", reference.method(), name, fetch_url);
        let response = self
            .fetcher
            .fetch(&fetch_url, timeout, Some(source_page.as_str()), &self.cancel)
            .await?;

        let is_watermark = matches!(reference, PdfReference::WatermarkHref(_));
        if is_watermark && is_html_error_page(&response) {
            return Err(DownloadError::HtmlInsteadOfPdf);
        }

        let content = extract_pdf_bytes(&response.body)
            .ok_or(DownloadError::MissingSignature(response.body.len()))?;
        if !is_valid_pdf(content) {
            return Err(DownloadError::InvalidPdf);
        }

        let target = if is_watermark {
            self.disposition_override(&response, key).unwrap_or(target)
        } else {
            target
        };

        tokio::fs::create_dir_all(&self.folder).await?;
        tokio::fs::write(&target, content).await?;
        tracing::info!(
            "Saved {} ({:.1} KB)",
            target.display(),
            content.len() as f64 / 1024.0
        );

        Ok(self.record(reference, source_page, target, |_| Utc::now()))
    }

    /// Path named by a `Content-Disposition` filename ending in `.pdf`, if any
    fn disposition_override(&self, response: &FetchedResponse, key: &str) -> Option<PathBuf> {
        let header = response.content_disposition.as_deref()?;
        let better_name = content_disposition_filename(header)?;
        if !better_name.ends_with(".pdf") {
            return None;
        }

        let name = sanitize_filename(&better_name);
        Some(unique_target_path(&self.folder, &name, key))
    }

    fn record<F>(
        &self,
        reference: &PdfReference,
        source_page: &Url,
        path: PathBuf,
        timestamp: F,
    ) -> DownloadRecord
    where
        F: FnOnce(&Path) -> DateTime<Utc>,
    {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let downloaded_at = timestamp(&path);

        DownloadRecord {
            url: reference.key().to_string(),
            path,
            filename,
            source_page: source_page.to_string(),
            method: reference.method(),
            downloaded_at,
        }
    }
}

/// Builds the watermark endpoint URL for an onclick PDF path
///
/// A leading `pdf/` and a trailing `.pdf` are stripped, the remainder is
/// percent-encoded, and the endpoint is placed on the source page's host.
///
/// # Examples
///
/// ```
/// use pdf_trawler::crawler::onclick_download_url;
/// use url::Url;
///
/// let page = Url::parse("https://example.mil/docs").unwrap();
/// let url = onclick_download_url("pdf/Policy/Laptop.pdf", &page).unwrap();
/// assert_eq!(
///     url.as_str(),
///     "https://example.mil/watermark/download.php?show=Policy%2FLaptop"
/// );
/// ```
pub fn onclick_download_url(pdf_path: &str, source_page: &Url) -> Result<Url, url::ParseError> {
    let name = pdf_path.strip_prefix("pdf/").unwrap_or(pdf_path);
    let name = name.strip_suffix(".pdf").unwrap_or(name);

    Url::parse(&format!(
        "{}://{}/watermark/download.php?show={}",
        source_page.scheme(),
        netloc(source_page),
        urlencoding::encode(name)
    ))
}

/// Detects an HTML error page served in place of a watermarked PDF
fn is_html_error_page(response: &FetchedResponse) -> bool {
    let content_type = response
        .content_type
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !content_type.contains("text/html") || content_type.contains("application/pdf") {
        return false;
    }

    let head = &response.body[..response.body.len().min(HTML_SNIFF_LEN)];
    head.to_ascii_lowercase()
        .windows(b"<html".len())
        .any(|window| window == b"<html")
}

fn modified_at(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
