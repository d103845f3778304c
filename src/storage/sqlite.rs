//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{DiscoveryMethod, DownloadRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{DocumentRecord, FileFingerprint, RunRecord, RunSummary};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, start_url, download_directory, config_hash, max_pages, max_pdfs, \
     pages_crawled, pdfs_downloaded, started_at, completed_at, created_at";

const DOCUMENT_COLUMNS: &str = "id, run_id, pdf_url, source_page, filename, stored_path, \
     file_size_bytes, downloaded_at, download_method, sha256, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn to_db_limit(limit: Option<usize>) -> Option<i64> {
    limit.map(|value| i64::try_from(value).unwrap_or(i64::MAX))
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        start_url: row.get(1)?,
        download_directory: row.get(2)?,
        config_hash: row.get(3)?,
        max_pages: row.get(4)?,
        max_pdfs: row.get(5)?,
        pages_crawled: row.get(6)?,
        pdfs_downloaded: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        pdf_url: row.get(2)?,
        source_page: row.get(3)?,
        filename: row.get(4)?,
        stored_path: row.get(5)?,
        file_size_bytes: row.get(6)?,
        downloaded_at: row.get(7)?,
        download_method: DiscoveryMethod::from_db_string(&row.get::<_, String>(8)?),
        sha256: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Writing =====

    fn record_run(&mut self, run: &RunSummary, documents: &[DownloadRecord]) -> StorageResult<i64> {
        // Hash before opening the transaction so no lock is held during file I/O
        let fingerprints = documents
            .iter()
            .map(|document| FileFingerprint::of(&document.path))
            .collect::<Result<Vec<_>, _>>()?;

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO crawl_runs (start_url, download_directory, config_hash, max_pages, max_pdfs,
                pages_crawled, pdfs_downloaded, started_at, completed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run.start_url,
                run.download_directory,
                run.config_hash,
                to_db_limit(run.max_pages),
                to_db_limit(run.max_pdfs),
                run.pages_crawled as i64,
                documents.len() as i64,
                run.started_at.to_rfc3339(),
                run.completed_at.map(|at| at.to_rfc3339()),
                now,
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO downloaded_documents (run_id, pdf_url, source_page, filename, stored_path,
                    file_size_bytes, downloaded_at, download_method, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            for (document, fingerprint) in documents.iter().zip(&fingerprints) {
                stmt.execute(params![
                    run_id,
                    document.url,
                    document.source_page,
                    document.filename,
                    document.path.display().to_string(),
                    fingerprint.size_bytes.map(|size| size as i64),
                    document.downloaded_at.to_rfc3339(),
                    document.method.as_str(),
                    fingerprint.sha256,
                    now,
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!("Recorded run {} with {} documents", run_id, documents.len());
        Ok(run_id)
    }

    // ===== Run Queries =====

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM crawl_runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM crawl_runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM crawl_runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map(params![to_db_limit(Some(limit))], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== Document Queries =====

    fn get_documents(&self, run_id: i64) -> StorageResult<Vec<DocumentRecord>> {
        let sql = format!(
            "SELECT {} FROM downloaded_documents WHERE run_id = ?1 ORDER BY downloaded_at DESC, id DESC",
            DOCUMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let documents = stmt
            .query_map(params![run_id], document_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    // ===== Statistics =====

    fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM crawl_runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_documents(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM downloaded_documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
