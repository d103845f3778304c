/// Download records and the references they are produced from
///
/// A [`PdfReference`] is what an extractor finds on a page; a
/// [`DownloadRecord`] is what a downloader produces once the PDF is on disk.
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Which heuristic discovered a PDF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryMethod {
    /// Path passed to a JavaScript download function in an `onclick` handler
    Onclick,

    /// Anchor pointing at a watermarking download endpoint
    WatermarkHref,

    /// Anchor pointing straight at a `.pdf` file
    Direct,
}

impl DiscoveryMethod {
    /// Converts the method to its persisted string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onclick => "onclick",
            Self::WatermarkHref => "watermark_href",
            Self::Direct => "direct",
        }
    }

    /// Parses a method from its persisted string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "onclick" => Some(Self::Onclick),
            "watermark_href" => Some(Self::WatermarkHref),
            "direct" => Some(Self::Direct),
            _ => None,
        }
    }
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A PDF reference found on a page, tagged with the heuristic that found it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PdfReference {
    /// Raw relative path such as `pdf/Policies/Laptop.pdf`
    Onclick(String),

    /// Absolute watermark endpoint URL
    WatermarkHref(Url),

    /// Absolute `.pdf` URL
    Direct(Url),
}

impl PdfReference {
    /// Key under which the reference is de-duplicated within a run
    pub fn key(&self) -> &str {
        match self {
            Self::Onclick(path) => path,
            Self::WatermarkHref(url) | Self::Direct(url) => url.as_str(),
        }
    }

    pub fn method(&self) -> DiscoveryMethod {
        match self {
            Self::Onclick(_) => DiscoveryMethod::Onclick,
            Self::WatermarkHref(_) => DiscoveryMethod::WatermarkHref,
            Self::Direct(_) => DiscoveryMethod::Direct,
        }
    }
}

/// A PDF that was validated and written to disk (or found there from an earlier run)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    /// Reference key: raw onclick path, watermark URL or direct URL
    pub url: String,

    /// Where the PDF lives on disk
    pub path: PathBuf,

    /// Final path component of `path`
    pub filename: String,

    /// Page the reference was discovered on
    pub source_page: String,

    pub method: DiscoveryMethod,

    /// UTC time of the write, or the file's modification time for pre-existing files
    pub downloaded_at: DateTime<Utc>,
}

/// Run-level counters, finalized when the crawl terminates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlMetadata {
    pub pages_crawled: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlMetadata {
    pub fn start() -> Self {
        Self {
            pages_crawled: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}
