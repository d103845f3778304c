//! Crawler module for page fetching and PDF discovery
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retries and TLS fallback
//! - HTML parsing and PDF reference extraction
//! - PDF downloading and validation
//! - The breadth-first frontier
//! - Overall crawl coordination

mod coordinator;
mod downloader;
mod fetcher;
mod frontier;
mod parser;

pub use coordinator::{crawl_and_download, Coordinator, CrawlOutcome, CrawlRequest};
pub use downloader::{onclick_download_url, DownloadError, DownloadTimeouts, Downloader};
pub use fetcher::{
    build_http_client, is_html_response, FetchError, FetchedResponse, Fetcher, RetryPolicy,
};
pub use frontier::Frontier;
pub use parser::{
    extract_direct_pdfs, extract_links, extract_onclick_pdfs, extract_watermark_hrefs,
    parse_page, ParsedPage,
};
