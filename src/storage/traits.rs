//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::DownloadRecord;
use crate::storage::{DocumentRecord, RunRecord, RunSummary};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Storage is only written once per crawl, after the run has finished.
pub trait Storage {
    // ===== Writing =====

    /// Records a finished run and every document it produced
    ///
    /// Each document's file size and SHA-256 are computed from disk. A file
    /// that no longer exists is stored with no size and an empty hash.
    ///
    /// # Arguments
    ///
    /// * `run` - Run-level summary
    /// * `documents` - Documents downloaded by the run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn record_run(&mut self, run: &RunSummary, documents: &[DownloadRecord]) -> StorageResult<i64>;

    // ===== Run Queries =====

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Lists the most recent runs, newest first
    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    // ===== Document Queries =====

    /// Gets the documents of a run, most recently downloaded first
    fn get_documents(&self, run_id: i64) -> StorageResult<Vec<DocumentRecord>>;

    // ===== Statistics =====

    /// Gets total run count
    fn count_runs(&self) -> StorageResult<u64>;

    /// Gets total document count across all runs
    fn count_documents(&self) -> StorageResult<u64>;
}
