//! PDF-Trawler: a single-site PDF harvester
//!
//! This crate crawls one web site breadth-first, discovers PDF documents exposed
//! through plain links, `onclick` download handlers and watermarking download
//! endpoints, validates every payload as a PDF and stores it on disk.

pub mod config;
pub mod crawler;
pub mod output;
pub mod pdf;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for PDF-Trawler operations
#[derive(Debug, Error)]
pub enum TrawlerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTML parse error for {url}: {message}")]
    HtmlParse { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Output(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("A valid hostname is required to start crawling")]
    MissingDomain,
}

/// Result type alias for PDF-Trawler operations
pub type Result<T> = std::result::Result<T, TrawlerError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl_and_download, Coordinator, CrawlOutcome, CrawlRequest, Fetcher};
pub use pdf::{extract_pdf_bytes, is_valid_pdf, sanitize_filename};
pub use state::{CrawlMetadata, CrawlState, DiscoveryMethod, DownloadRecord, ProgressEvent};
pub use crate::url::{derive_download_directory, normalize_start_url};
