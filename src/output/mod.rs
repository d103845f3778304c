//! Output module for crawl summaries and reports
//!
//! This module handles:
//! - Formatting downloaded documents for display
//! - Console summaries after a crawl and for stored runs
//! - Exporting a markdown report of a stored run

mod markdown;
pub mod stats;

pub use markdown::{export_markdown_report, format_markdown_report};
pub use stats::{load_statistics, print_crawl_summary, print_statistics, StorageStatistics};

use crate::state::DownloadRecord;
use crate::storage::{DocumentRecord, RunRecord, Storage};
use crate::TrawlerError;
use chrono::{DateTime, Utc};

/// Display format for every timestamp shown to users
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// A document prepared for display
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentView {
    pub filename: String,
    pub path: String,

    /// Size in KiB rounded to two decimals, when the file exists
    pub size_kib: Option<f64>,

    /// `%Y-%m-%d %H:%M:%S UTC`
    pub downloaded_at: String,

    pub method: String,
    pub url: String,
    pub source_page: String,

    sort_key: Option<DateTime<Utc>>,
}

impl DocumentView {
    /// Builds a view of a fresh download, reading its size from disk
    pub fn from_download(record: &DownloadRecord) -> Self {
        let size_bytes = std::fs::metadata(&record.path)
            .ok()
            .filter(|metadata| metadata.is_file())
            .map(|metadata| metadata.len());

        Self {
            filename: record.filename.clone(),
            path: record.path.display().to_string(),
            size_kib: size_bytes.map(bytes_to_kib),
            downloaded_at: format_timestamp(&record.downloaded_at),
            method: record.method.to_string(),
            url: record.url.clone(),
            source_page: record.source_page.clone(),
            sort_key: Some(record.downloaded_at),
        }
    }

    /// Builds a view of a stored document row
    pub fn from_stored(document: &DocumentRecord) -> Self {
        let parsed = parse_timestamp(&document.downloaded_at);

        Self {
            filename: document.filename.clone(),
            path: document.stored_path.clone(),
            size_kib: document
                .file_size_bytes
                .map(|bytes| bytes_to_kib(bytes.max(0) as u64)),
            downloaded_at: parsed
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_else(|| document.downloaded_at.clone()),
            method: document
                .download_method
                .map(|method| method.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            url: document.pdf_url.clone(),
            source_page: document.source_page.clone(),
            sort_key: parsed,
        }
    }

    /// Size column text, `-` when unknown
    pub fn size_label(&self) -> String {
        match self.size_kib {
            Some(kib) => format!("{:.2} KiB", kib),
            None => "-".to_string(),
        }
    }
}

/// Formats downloaded documents for display, most recent first
pub fn format_documents(records: &[DownloadRecord]) -> Vec<DocumentView> {
    sort_newest_first(records.iter().map(DocumentView::from_download).collect())
}

/// Formats stored document rows for display, most recent first
pub fn format_stored_documents(documents: &[DocumentRecord]) -> Vec<DocumentView> {
    sort_newest_first(documents.iter().map(DocumentView::from_stored).collect())
}

fn sort_newest_first(mut views: Vec<DocumentView>) -> Vec<DocumentView> {
    views.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));
    views
}

/// Formats a UTC timestamp as `%Y-%m-%d %H:%M:%S UTC`
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses an RFC 3339 timestamp as stored in the database
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}

fn bytes_to_kib(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 * 100.0).round() / 100.0
}

/// A stored run together with its documents
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: RunRecord,
    pub documents: Vec<DocumentView>,
}

impl RunReport {
    /// Duration of the run in seconds, when it has a completion time
    pub fn duration_seconds(&self) -> Option<i64> {
        let started = parse_timestamp(&self.run.started_at)?;
        let completed = parse_timestamp(self.run.completed_at.as_deref()?)?;
        Some((completed - started).num_seconds())
    }
}

/// Loads the most recent run and its documents
///
/// # Returns
///
/// * `Ok(RunReport)` - The latest run
/// * `Err(TrawlerError::Output)` - The database holds no runs
pub fn load_latest_report(storage: &dyn Storage) -> Result<RunReport, TrawlerError> {
    let run = storage
        .get_latest_run()?
        .ok_or_else(|| TrawlerError::Output("No crawl runs found in database".to_string()))?;
    let documents = format_stored_documents(&storage.get_documents(run.id)?);

    Ok(RunReport { run, documents })
}
