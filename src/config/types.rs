use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for PDF-Trawler
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of attempts per fetch
    pub retries: u32,

    /// Delay between fetch attempts (seconds)
    #[serde(rename = "retry-delay")]
    pub retry_delay: u64,

    /// Timeout for HTML page fetches (seconds)
    #[serde(rename = "page-timeout")]
    pub page_timeout: u64,

    /// Timeout for onclick and watermark downloads (seconds)
    #[serde(rename = "watermark-timeout")]
    pub watermark_timeout: u64,

    /// Timeout for direct PDF downloads (seconds)
    #[serde(rename = "direct-timeout")]
    pub direct_timeout: u64,

    /// Verify TLS certificates, falling back to an unverified retry on failure
    #[serde(rename = "verify-ssl")]
    pub verify_ssl: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay: 5,
            page_timeout: 15,
            watermark_timeout: 60,
            direct_timeout: 30,
            verify_ssl: true,
        }
    }
}

impl CrawlerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout)
    }

    pub fn watermark_timeout(&self) -> Duration {
        Duration::from_secs(self.watermark_timeout)
    }

    pub fn direct_timeout(&self) -> Duration {
        Duration::from_secs(self.direct_timeout)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root folder under which one directory per crawled host is created
    #[serde(rename = "download-root")]
    pub download_root: String,

    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            download_root: "./downloaded_pdfs".to_string(),
            database_path: "./pdf_trawler.db".to_string(),
        }
    }
}
