//! State module for a single crawl run
//!
//! # Components
//!
//! - `PdfReference` / `DiscoveryMethod`: what the extractors find and which heuristic found it
//! - `DownloadRecord`: a PDF stored on disk
//! - `CrawlMetadata`: run-level counters and timestamps
//! - `ProgressEvent` / `ProgressSink`: live progress reporting

mod progress;
mod record;

// Re-export main types
pub use progress::{CrawlState, NoopSink, ProgressEvent, ProgressSink, TracingSink};
pub use record::{CrawlMetadata, DiscoveryMethod, DownloadRecord, PdfReference};
