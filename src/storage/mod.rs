//! Storage module for persisting crawl results
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - One summary row per crawl run
//! - One row per downloaded document, with file size and SHA-256
//!
//! The crawl itself never touches the database; runs are recorded after
//! they finish.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::crawler::{CrawlOutcome, CrawlRequest};
use crate::state::DiscoveryMethod;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer used when hashing stored files
const HASH_CHUNK_SIZE: usize = 8 * 1024;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Run-level data handed to [`Storage::record_run`]
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub start_url: String,
    pub download_directory: String,
    pub config_hash: String,
    pub max_pages: Option<usize>,
    pub max_pdfs: Option<usize>,
    pub pages_crawled: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Builds the summary of a finished crawl
    pub fn from_outcome(request: &CrawlRequest, outcome: &CrawlOutcome, config_hash: &str) -> Self {
        Self {
            start_url: request.start_url.to_string(),
            download_directory: request.destination.display().to_string(),
            config_hash: config_hash.to_string(),
            max_pages: request.max_pages,
            max_pdfs: request.max_pdfs,
            pages_crawled: outcome.metadata.pages_crawled,
            started_at: outcome.metadata.started_at,
            completed_at: outcome.metadata.finished_at,
        }
    }
}

/// Represents a crawl run in the database
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub start_url: String,
    pub download_directory: String,
    pub config_hash: String,
    pub max_pages: Option<i64>,
    pub max_pdfs: Option<i64>,
    pub pages_crawled: i64,
    pub pdfs_downloaded: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub created_at: String,
}

/// Represents a downloaded document in the database
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: i64,
    pub run_id: i64,
    pub pdf_url: String,
    pub source_page: String,
    pub filename: String,
    pub stored_path: String,
    pub file_size_bytes: Option<i64>,
    pub downloaded_at: String,
    pub download_method: Option<DiscoveryMethod>,
    pub sha256: String,
    pub created_at: String,
}

/// Size and content hash of a stored file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    /// `None` when the file does not exist
    pub size_bytes: Option<u64>,

    /// Lower-case hex SHA-256, empty when the file does not exist
    pub sha256: String,
}

impl FileFingerprint {
    /// Measures and hashes a file, streaming it in 8 KiB chunks
    pub fn of(path: &Path) -> io::Result<Self> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    size_bytes: None,
                    sha256: String::new(),
                })
            }
            Err(err) => return Err(err),
        };

        let mut hasher = Sha256::new();
        let mut buffer = [0u8; HASH_CHUNK_SIZE];
        let mut size = 0u64;
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            size += read as u64;
        }

        Ok(Self {
            size_bytes: Some(size),
            sha256: hex::encode(hasher.finalize()),
        })
    }
}
