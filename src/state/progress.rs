/// Live progress reporting
///
/// The coordinator emits a [`ProgressEvent`] at every milestone. Sinks are
/// invoked synchronously; an error returned by a sink is logged and otherwise
/// ignored, so a broken sink can never stop a crawl.
use std::fmt;

/// Lifecycle state of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    Running,
    Completed,
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("Running"),
            Self::Completed => f.write_str("Completed"),
        }
    }
}

/// A snapshot of crawl progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub state: CrawlState,

    /// Start URL of the run
    pub website: String,

    /// Page being processed, when the event concerns one
    pub current_url: Option<String>,

    pub pages_crawled: usize,
    pub downloaded: usize,
    pub message: String,
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent) -> anyhow::Result<()>;
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn emit(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Sink that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: &ProgressEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Sink that forwards events to the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        tracing::info!(
            "[{}] pages={} pdfs={} {}",
            event.state,
            event.pages_crawled,
            event.downloaded,
            event.message
        );
        Ok(())
    }
}
