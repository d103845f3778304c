//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the breadth-first crawl loop that ties together:
//! - The frontier and visited set
//! - Page fetching and parsing
//! - The three PDF download passes (onclick, watermark href, direct)
//! - Page and PDF limits, cancellation and progress reporting
//!
//! Pages are processed one at a time; every download for a page finishes
//! before the next page is dequeued. Failures of individual pages or PDFs are
//! logged and skipped, so a run always ends in [`CrawlState::Completed`].

use crate::config::CrawlerConfig;
use crate::crawler::downloader::{DownloadTimeouts, Downloader};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::Frontier;
use crate::crawler::parser::{parse_page, ParsedPage};
use crate::state::{
    CrawlMetadata, CrawlState, DiscoveryMethod, DownloadRecord, PdfReference, ProgressEvent,
    ProgressSink,
};
use crate::url::AllowedHosts;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything that parameterizes one crawl run
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// First page to crawl
    pub start_url: Url,

    /// Folder the PDFs are written to
    pub destination: PathBuf,

    /// Hosts (`host` or `host:port`) links and direct PDFs must belong to; `None` allows any
    pub allowed_hosts: Option<AllowedHosts>,

    /// Maximum number of pages to crawl
    pub max_pages: Option<usize>,

    /// Maximum number of PDFs to download
    pub max_pdfs: Option<usize>,

    /// Timeout for page fetches
    pub page_timeout: Duration,

    pub download_timeouts: DownloadTimeouts,
}

impl CrawlRequest {
    /// Creates a request with no limits, no allow-list and default timeouts
    pub fn new(start_url: Url, destination: impl Into<PathBuf>) -> Self {
        Self {
            start_url,
            destination: destination.into(),
            allowed_hosts: None,
            max_pages: None,
            max_pdfs: None,
            page_timeout: Duration::from_secs(15),
            download_timeouts: DownloadTimeouts::default(),
        }
    }

    /// Creates a request using the timeouts from the crawler configuration
    pub fn from_config(start_url: Url, destination: impl Into<PathBuf>, config: &CrawlerConfig) -> Self {
        Self::new(start_url, destination)
            .with_page_timeout(config.page_timeout())
            .with_download_timeouts(DownloadTimeouts {
                watermark: config.watermark_timeout(),
                direct: config.direct_timeout(),
            })
    }

    pub fn with_allowed_hosts(mut self, allowed_hosts: AllowedHosts) -> Self {
        self.allowed_hosts = if allowed_hosts.is_empty() {
            None
        } else {
            Some(allowed_hosts)
        };
        self
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_pdfs(mut self, max_pdfs: Option<usize>) -> Self {
        self.max_pdfs = max_pdfs;
        self
    }

    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn with_download_timeouts(mut self, timeouts: DownloadTimeouts) -> Self {
        self.download_timeouts = timeouts;
        self
    }

    fn host_permitted(&self, url: &Url) -> bool {
        self.allowed_hosts
            .as_ref()
            .map_or(true, |allowed| allowed.permits(url))
    }
}

/// Result of a crawl run
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Downloaded PDFs in the order they were obtained
    pub documents: Vec<DownloadRecord>,

    pub metadata: CrawlMetadata,
}

/// Forwards progress events to a sink, logging and swallowing sink errors
struct Reporter<'a> {
    sink: &'a dyn ProgressSink,
    website: String,
}

impl Reporter<'_> {
    fn report(
        &self,
        state: CrawlState,
        current_url: Option<&Url>,
        pages_crawled: usize,
        downloaded: usize,
        message: String,
    ) {
        let event = ProgressEvent {
            state,
            website: self.website.clone(),
            current_url: current_url.map(|url| url.to_string()),
            pages_crawled,
            downloaded,
            message,
        };

        if let Err(err) = self.sink.emit(&event) {
            tracing::warn!("Progress sink failed: {:#}", err);
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator<'a> {
    request: CrawlRequest,
    fetcher: &'a Fetcher,
    cancel: CancellationToken,
}

/// Per-run mutable state of the crawl loop
struct RunState {
    frontier: Frontier,
    documents: Vec<DownloadRecord>,
    downloaded_keys: HashSet<String>,
    metadata: CrawlMetadata,
}

/// Why a download pass stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    PdfLimit,
    Cancelled,
}

impl<'a> Coordinator<'a> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `request` - What to crawl and within which limits
    /// * `fetcher` - HTTP fetcher carrying the retry policy and TLS mode
    pub fn new(request: CrawlRequest, fetcher: &'a Fetcher) -> Self {
        Self {
            request,
            fetcher,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops the run cooperatively once `token` is cancelled
    ///
    /// The token is checked before each page and before each download, and
    /// aborts any fetch or retry delay in flight. A cancelled run still
    /// completes normally with what it has downloaded.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }


    /// Runs the crawl to completion
    ///
    /// # Returns
    ///
    /// The downloaded documents and run metadata. Page and PDF failures are
    /// logged and skipped; this never fails.
    pub async fn run(self, sink: &dyn ProgressSink) -> CrawlOutcome {
        let reporter = Reporter {
            sink,
            website: self.request.start_url.to_string(),
        };
        let downloader = Downloader::new(
            self.fetcher,
            self.request.destination.clone(),
            self.request.download_timeouts,
        )
        .with_cancellation(self.cancel.clone());

        if let Err(err) = tokio::fs::create_dir_all(&self.request.destination).await {
            tracing::warn!(
                "Could not create {}: {}",
                self.request.destination.display(),
                err
            );
        }

        tracing::info!(
            "Starting crawl of {} into {}",
            self.request.start_url,
            self.request.destination.display()
        );

        let mut run = RunState {
            frontier: Frontier::new(self.request.start_url.clone()),
            documents: Vec::new(),
            downloaded_keys: HashSet::new(),
            metadata: CrawlMetadata::start(),
        };

        reporter.report(
            CrawlState::Running,
            None,
            0,
            0,
            "Crawling started".to_string(),
        );

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Crawl cancelled");
                break;
            }

            if let Some(max_pages) = self.request.max_pages {
                if run.metadata.pages_crawled >= max_pages {
                    tracing::info!("Reached maximum page limit of {}", max_pages);
                    break;
                }
            }

            if self.pdf_limit_reached(&run) {
                break;
            }

            let Some(url) = run.frontier.pop() else {
                break;
            };
            if !run.frontier.mark_visited(&url) {
                continue;
            }
            run.metadata.pages_crawled += 1;
            let page_number = run.metadata.pages_crawled;

            reporter.report(
                CrawlState::Running,
                Some(&url),
                page_number,
                run.documents.len(),
                format!("Crawling page {}: {}", page_number, url),
            );

            let Some(page) = self.fetch_page(&url).await else {
                continue;
            };

            tracing::info!(
                "Found {} PDFs on {} ({} onclick, {} watermark, {} direct)",
                page.pdf_count(),
                url,
                page.onclick.len(),
                page.watermark.len(),
                page.direct.len()
            );
            reporter.report(
                CrawlState::Running,
                Some(&url),
                page_number,
                run.documents.len(),
                format!("Found {} PDFs on page {}", page.pdf_count(), page_number),
            );

            let ParsedPage {
                onclick,
                watermark,
                direct,
                links,
            } = page;

            let direct: Vec<Url> = direct
                .into_iter()
                .filter(|pdf_url| {
                    let permitted = self.request.host_permitted(pdf_url);
                    if !permitted {
                        tracing::debug!("Skipping off-site PDF {}", pdf_url);
                    }
                    permitted
                })
                .collect();

            let batches = [
                onclick.into_iter().map(PdfReference::Onclick).collect::<Vec<_>>(),
                watermark
                    .into_iter()
                    .map(PdfReference::WatermarkHref)
                    .collect(),
                direct.into_iter().map(PdfReference::Direct).collect(),
            ];

            let mut interrupted = None;
            for batch in batches {
                interrupted = self
                    .download_batch(&downloader, &reporter, &mut run, batch, &url)
                    .await;
                if interrupted.is_some() {
                    break;
                }
            }

            match interrupted {
                Some(Interrupt::PdfLimit) => {
                    if let Some(max_pdfs) = self.request.max_pdfs {
                        tracing::info!("Reached maximum PDF limit of {}", max_pdfs);
                    }
                    break;
                }
                Some(Interrupt::Cancelled) => {
                    tracing::info!("Crawl cancelled");
                    break;
                }
                None => {}
            }

            let mut queued = 0;
            for link in links {
                if !self.request.host_permitted(&link) {
                    continue;
                }
                if run.frontier.push(link) {
                    queued += 1;
                }
            }

            if queued > 0 {
                tracing::info!(
                    "Queued {} new links (total in queue: {})",
                    queued,
                    run.frontier.len()
                );
                reporter.report(
                    CrawlState::Running,
                    Some(&url),
                    page_number,
                    run.documents.len(),
                    format!("Queued {} new links", queued),
                );
            }
        }

        run.metadata.finish();
        tracing::info!(
            "Crawl complete: {} pages crawled, {} PDFs downloaded",
            run.metadata.pages_crawled,
            run.documents.len()
        );

        reporter.report(
            CrawlState::Completed,
            None,
            run.metadata.pages_crawled,
            run.documents.len(),
            "Crawl finished successfully.".to_string(),
        );

        CrawlOutcome {
            documents: run.documents,
            metadata: run.metadata,
        }
    }

    /// Fetches and parses one page, or logs why it was skipped
    async fn fetch_page(&self, url: &Url) -> Option<ParsedPage> {
        let response = match self
            .fetcher
            .fetch(url, self.request.page_timeout, None, &self.cancel)
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_cancelled() => {
                tracing::debug!("{}", err);
                return None;
            }
            Err(err) => {
                tracing::warn!("Skipping page {}: {}", url, err);
                return None;
            }
        };

        if !response.is_html() {
            tracing::debug!(
                "Skipping non-HTML page {} ({})",
                url,
                response.content_type.as_deref().unwrap_or("no content type")
            );
            return None;
        }

        match parse_page(&response.body, &response.url) {
            Ok(page) => Some(page),
            Err(err) => {
                tracing::warn!("Skipping {}: {}", url, err);
                None
            }
        }
    }

    /// Downloads one category of references from a page
    async fn download_batch(
        &self,
        downloader: &Downloader<'_>,
        reporter: &Reporter<'_>,
        run: &mut RunState,
        batch: Vec<PdfReference>,
        source_page: &Url,
    ) -> Option<Interrupt> {
        for reference in batch {
            if self.cancel.is_cancelled() {
                return Some(Interrupt::Cancelled);
            }

            if run.downloaded_keys.contains(reference.key()) {
                tracing::debug!("Already downloaded {}", reference.key());
                continue;
            }

            let Some(record) = downloader.resolve(&reference, source_page).await else {
                continue;
            };
            let message = format!(
                "Downloaded {} PDF: {}",
                method_label(record.method),
                record.filename
            );

            run.downloaded_keys.insert(reference.key().to_string());
            run.documents.push(record);

            reporter.report(
                CrawlState::Running,
                None,
                run.metadata.pages_crawled,
                run.documents.len(),
                message,
            );

            if self.pdf_limit_reached(run) {
                return Some(Interrupt::PdfLimit);
            }
        }

        if self.cancel.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        None
    }

    fn pdf_limit_reached(&self, run: &RunState) -> bool {
        self.request
            .max_pdfs
            .map_or(false, |max_pdfs| run.documents.len() >= max_pdfs)
    }
}

fn method_label(method: DiscoveryMethod) -> &'static str {
    match method {
        DiscoveryMethod::Onclick => "onclick",
        DiscoveryMethod::WatermarkHref => "watermark",
        DiscoveryMethod::Direct => "direct",
    }
}

/// Crawls a site breadth-first and downloads every PDF it can find
///
/// # Arguments
///
/// * `request` - Start URL, destination, allow-list, limits and timeouts
/// * `fetcher` - HTTP fetcher carrying the retry policy and TLS mode
/// * `sink` - Receives progress events; its errors are logged and ignored
///
/// # Returns
///
/// The downloaded documents and the run metadata.
pub async fn crawl_and_download(
    request: CrawlRequest,
    fetcher: &Fetcher,
    sink: &dyn ProgressSink,
) -> CrawlOutcome {
    Coordinator::new(request, fetcher).run(sink).await
}
