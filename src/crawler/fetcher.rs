//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made during a crawl:
//! - Building clients with a browser-like header profile
//! - Bounded retries with a fixed delay between attempts
//! - A one-shot fallback to an unverified client after a TLS failure
//! - Content-Type classification of page responses

use crate::config::CrawlerConfig;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION,
    CONTENT_DISPOSITION, CONTENT_TYPE, REFERER, USER_AGENT,
};
use reqwest::{Client, StatusCode};
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "application/pdf,text/html,application/xhtml+xml,application/xml;q=0.9,\
     image/avif,image/webp,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const BROWSER_ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// Substrings that mark a transport error as a TLS/certificate failure
const TLS_ERROR_MARKERS: &[&str] = &["certificate", "tls", "ssl", "handshake"];

/// Errors produced while fetching a single URL
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("TLS verification failed for {url}: {message}")]
    Tls { url: String, message: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("Fetch of {url} cancelled")]
    Cancelled { url: String },

    #[error("Gave up on {url} after {attempts} attempt(s): {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    pub fn is_tls(&self) -> bool {
        match self {
            Self::Tls { .. } => true,
            Self::Exhausted { last, .. } => last.is_tls(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// How many times a fetch is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts; values below 1 are treated as 1
    pub retries: u32,

    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Number of attempts actually made
    pub fn attempts(&self) -> u32 {
        self.retries.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// A successful (HTTP 200) response with its body fully read
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// Final URL after redirects
    pub url: Url,

    pub status: u16,

    /// Raw `Content-Type` header, if any
    pub content_type: Option<String>,

    /// Raw `Content-Disposition` header, if any
    pub content_disposition: Option<String>,

    pub body: Vec<u8>,
}

impl FetchedResponse {
    /// Whether the response should be treated as a crawlable page
    pub fn is_html(&self) -> bool {
        is_html_response(self.content_type.as_deref())
    }
}

/// Classifies a `Content-Type` value as HTML-like
///
/// A response is HTML-like when its lower-cased content type contains `html`
/// or `xml`, or starts with `text/`. A missing header is not HTML.
pub fn is_html_response(content_type: Option<&str>) -> bool {
    match content_type {
        Some(value) => {
            let lower = value.to_ascii_lowercase();
            lower.contains("html") || lower.contains("xml") || lower.starts_with("text/")
        }
        None => false,
    }
}

/// Builds an HTTP client with the browser header profile
///
/// # Arguments
///
/// * `verify_certificates` - Whether TLS certificates are validated
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(FetchError::Client)` - Failed to build client
pub fn build_http_client(verify_certificates: bool) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(BROWSER_ACCEPT_ENCODING));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .danger_accept_invalid_certs(!verify_certificates)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(FetchError::Client)
}

/// HTTP fetcher shared by the crawl loop and the downloaders
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,

    /// Unverified client, present only while verification is enabled
    fallback: Option<Client>,

    policy: RetryPolicy,
}

impl Fetcher {
    /// Creates a fetcher
    ///
    /// With `verify_ssl` enabled, a second client that skips certificate
    /// validation is kept for a single retry after a TLS failure. With it
    /// disabled, the only client never verifies and TLS failures are final.
    pub fn new(verify_ssl: bool, policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = build_http_client(verify_ssl)?;
        let fallback = if verify_ssl {
            Some(build_http_client(false)?)
        } else {
            None
        };

        Ok(Self {
            client,
            fallback,
            policy,
        })
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self, FetchError> {
        Self::new(
            config.verify_ssl,
            RetryPolicy::new(config.retries, config.retry_delay()),
        )
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetches a URL, retrying until an HTTP 200 response arrives
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 200 | Return the response |
    /// | Any other status | Retry after the delay |
    /// | Timeout / connection error | Retry after the delay |
    /// | TLS error, verification on | Repeat once unverified, then retry after the delay |
    /// | TLS error, verification off | Retry after the delay |
    /// | `cancel` fired | Abort the in-flight attempt or delay |
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `timeout` - Per-request timeout
    /// * `referer` - Optional `Referer` header value
    /// * `cancel` - Checked before each attempt and raced against every
    ///   request and delay
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedResponse)` - The first HTTP 200 response
    /// * `Err(FetchError::Cancelled)` - `cancel` fired first
    /// * `Err(FetchError::Exhausted)` - Every attempt failed
    pub async fn fetch(
        &self,
        url: &Url,
        timeout: Duration,
        referer: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FetchedResponse, FetchError> {
        let attempts = self.policy.attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Err(cancelled(url));
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled(url)),
                result = self.attempt(url, timeout, referer) => result,
            };

            match result {
                Ok(response) => return Ok(response),
                Err(err) => {
                    tracing::debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt,
                        attempts,
                        url,
                        err
                    );
                    last_error = Some(err);
                }
            }

            if attempt < attempts && !self.policy.delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(cancelled(url)),
                    _ = tokio::time::sleep(self.policy.delay) => {}
                }
            }
        }

        let last = last_error.unwrap_or_else(|| FetchError::Transport {
            url: url.to_string(),
            message: "no attempt made".to_string(),
        });

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            last: Box::new(last),
        })
    }

    /// One attempt, including the unverified repeat after a TLS failure
    async fn attempt(
        &self,
        url: &Url,
        timeout: Duration,
        referer: Option<&str>,
    ) -> Result<FetchedResponse, FetchError> {
        match send(&self.client, url, timeout, referer).await {
            Err(err) if err.is_tls() => match &self.fallback {
                Some(fallback) => {
                    tracing::warn!(
                        "TLS verification failed for {}, retrying without verification",
                        url
                    );
                    send(fallback, url, timeout, referer).await
                }
                None => Err(err),
            },
            result => result,
        }
    }
}

fn cancelled(url: &Url) -> FetchError {
    FetchError::Cancelled {
        url: url.to_string(),
    }
}

async fn send(
    client: &Client,
    url: &Url,
    timeout: Duration,
    referer: Option<&str>,
) -> Result<FetchedResponse, FetchError> {
    let mut request = client.get(url.clone()).timeout(timeout);
    if let Some(referer) = referer {
        request = request.header(REFERER, referer);
    }

    let response = request
        .send()
        .await
        .map_err(|err| classify_transport_error(url, err))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().clone();
    let content_type = header_string(response.headers(), CONTENT_TYPE);
    let content_disposition = header_string(response.headers(), CONTENT_DISPOSITION);

    let body = response.bytes().await.map_err(|err| FetchError::Body {
        url: url.to_string(),
        message: err.to_string(),
    })?;

    Ok(FetchedResponse {
        url: final_url,
        status: status.as_u16(),
        content_type,
        content_disposition,
        body: body.to_vec(),
    })
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn classify_transport_error(url: &Url, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout {
            url: url.to_string(),
        };
    }

    let err = err.without_url();
    let message = error_chain_message(&err);
    if is_tls_message(&message) {
        FetchError::Tls {
            url: url.to_string(),
            message,
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message,
        }
    }
}

/// Joins an error and all of its sources into one line
fn error_chain_message(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

fn is_tls_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    TLS_ERROR_MARKERS.iter().any(|marker| lower.contains(marker))
}
