//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the PDF-Trawler database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per finished crawl
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_url TEXT NOT NULL,
    download_directory TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    max_pages INTEGER,
    max_pdfs INTEGER,
    pages_crawled INTEGER NOT NULL DEFAULT 0,
    pdfs_downloaded INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_runs_started ON crawl_runs(started_at);

-- One row per PDF stored by a run
CREATE TABLE IF NOT EXISTS downloaded_documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES crawl_runs(id) ON DELETE CASCADE,
    pdf_url TEXT NOT NULL,
    source_page TEXT NOT NULL,
    filename TEXT NOT NULL,
    stored_path TEXT NOT NULL,
    file_size_bytes INTEGER,
    downloaded_at TEXT NOT NULL,
    download_method TEXT NOT NULL,
    sha256 TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_run ON downloaded_documents(run_id);
CREATE INDEX IF NOT EXISTS idx_documents_downloaded ON downloaded_documents(downloaded_at);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
