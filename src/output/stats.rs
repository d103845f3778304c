//! Console summaries
//!
//! This module prints the summary shown after a crawl and the run listing
//! shown by `--stats`.

use crate::crawler::{CrawlOutcome, CrawlRequest};
use crate::output::{format_documents, format_timestamp, parse_timestamp, DocumentView};
use crate::storage::{RunRecord, Storage};
use crate::TrawlerError;

/// Aggregate view of the database
#[derive(Debug, Clone)]
pub struct StorageStatistics {
    /// Total number of recorded runs
    pub total_runs: u64,

    /// Total number of recorded documents across all runs
    pub total_documents: u64,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `limit` - How many recent runs to include
///
/// # Returns
///
/// * `Ok(StorageStatistics)` - Successfully loaded statistics
/// * `Err(TrawlerError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage, limit: usize) -> Result<StorageStatistics, TrawlerError> {
    Ok(StorageStatistics {
        total_runs: storage.count_runs()?,
        total_documents: storage.count_documents()?,
        recent_runs: storage.list_runs(limit)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StorageStatistics) {
    println!("=== PDF-Trawler Statistics ===\n");

    println!("Overview:");
    println!("  Crawl runs recorded: {}", stats.total_runs);
    println!("  Documents recorded: {}", stats.total_documents);
    println!();

    if stats.recent_runs.is_empty() {
        println!("No crawl runs found in database.");
        return;
    }

    println!("Recent Runs:");
    for run in &stats.recent_runs {
        println!(
            "  #{} {} ({} pages, {} PDFs)",
            run.id, run.start_url, run.pages_crawled, run.pdfs_downloaded
        );
        println!("      started:  {}", display_stored_time(&run.started_at));
        if let Some(completed) = &run.completed_at {
            println!("      finished: {}", display_stored_time(completed));
        }
        println!("      saved to: {}", run.download_directory);
    }
}

/// Prints the summary of a finished crawl
pub fn print_crawl_summary(request: &CrawlRequest, outcome: &CrawlOutcome) {
    let metadata = &outcome.metadata;

    println!("\n=== Crawl Complete ===\n");
    println!("  Target: {}", request.start_url);
    println!("  Saved to: {}", request.destination.display());
    println!("  Pages crawled: {}", metadata.pages_crawled);
    println!("  PDFs downloaded: {}", outcome.documents.len());
    println!("  Page limit: {}", describe_limit(request.max_pages));
    println!("  PDF limit: {}", describe_limit(request.max_pdfs));
    println!("  Started: {}", format_timestamp(&metadata.started_at));
    if let Some(finished) = &metadata.finished_at {
        println!("  Finished: {}", format_timestamp(finished));
    }
    if let Some(duration) = metadata.duration_seconds() {
        println!("  Duration: {} seconds", duration);
    }

    let documents = format_documents(&outcome.documents);
    if !documents.is_empty() {
        println!("\nDocuments:");
        for document in &documents {
            println!("  {}", document_line(document));
        }
    }
    println!();
}

fn document_line(document: &DocumentView) -> String {
    format!(
        "{} [{}] {} via {}",
        document.filename,
        document.size_label(),
        document.downloaded_at,
        document.method
    )
}

fn describe_limit(limit: Option<usize>) -> String {
    limit.map_or_else(|| "none".to_string(), |value| value.to_string())
}

fn display_stored_time(value: &str) -> String {
    parse_timestamp(value)
        .map(|timestamp| format_timestamp(&timestamp))
        .unwrap_or_else(|| value.to_string())
}
