//! HTML parser for extracting PDF references and links
//!
//! This module handles parsing a fetched page to extract:
//! - PDF paths passed to JavaScript download functions in `onclick` handlers
//! - Anchors pointing at watermarking download endpoints
//! - Anchors pointing straight at `.pdf` files
//! - Links to follow
//!
//! `scraper::Html` is not `Send`, so a page is reduced to an owned
//! [`ParsedPage`] before the crawl loop awaits anything.

use crate::url::is_crawlable_link;
use crate::TrawlerError;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Number of leading bytes inspected when deciding whether a body is binary
const BINARY_SNIFF_LEN: usize = 1024;

/// Substrings that mark an href as a watermark download even without `watermark/download.php`
const WATERMARK_HREF_MARKERS: &[&str] = &["getpdf", "showpdf", "viewpdf", "downloadpdf"];

/// Everything the crawl loop needs from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// Raw onclick PDF paths, in document order, de-duplicated
    pub onclick: Vec<String>,

    /// Absolute watermark download URLs, in document order, de-duplicated
    pub watermark: Vec<Url>,

    /// Absolute direct PDF URLs, in document order, de-duplicated
    pub direct: Vec<Url>,

    /// Absolute crawlable links with fragments removed, in document order
    pub links: Vec<Url>,
}

impl ParsedPage {
    /// Total number of PDF references on the page
    pub fn pdf_count(&self) -> usize {
        self.onclick.len() + self.watermark.len() + self.direct.len()
    }
}

fn onclick_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i)(?:downloadWithWatermark|download|openPDF|viewPDF|getPDF)\s*\(\s*['"]([^'"]+\.pdf[^'"]*)['"]"#,
        )
        .expect("onclick pattern is valid")
    })
}

fn anchor_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("anchor selector is valid"))
}

fn onclick_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("[onclick]").expect("onclick selector is valid"))
}

/// Parses a page body and runs every extractor over it
///
/// # Arguments
///
/// * `body` - Raw response body
/// * `base_url` - The page URL, used to resolve relative hrefs
///
/// # Returns
///
/// * `Ok(ParsedPage)` - References and links found on the page
/// * `Err(TrawlerError::HtmlParse)` - The body is binary rather than markup
///
/// # Example
///
/// ```
/// use pdf_trawler::crawler::parse_page;
/// use url::Url;
///
/// let html = br#"<html><body><a href="report.pdf">Report</a><a href="/about">About</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/docs/").unwrap();
/// let page = parse_page(html, &base_url).unwrap();
/// assert_eq!(page.direct[0].as_str(), "https://example.com/docs/report.pdf");
/// assert_eq!(page.links[0].as_str(), "https://example.com/about");
/// ```
pub fn parse_page(body: &[u8], base_url: &Url) -> Result<ParsedPage, TrawlerError> {
    let sniff = &body[..body.len().min(BINARY_SNIFF_LEN)];
    if sniff.contains(&0) {
        return Err(TrawlerError::HtmlParse {
            url: base_url.to_string(),
            message: "body contains binary data".to_string(),
        });
    }

    let text = String::from_utf8_lossy(body);
    let document = Html::parse_document(&text);

    Ok(ParsedPage {
        onclick: extract_onclick_pdfs(&document),
        watermark: extract_watermark_hrefs(&document, base_url),
        direct: extract_direct_pdfs(&document, base_url),
        links: extract_links(&document, base_url),
    })
}

/// Finds PDF paths passed to known download functions in `onclick` handlers
///
/// Matches calls such as `downloadWithWatermark('pdf/Laptop_Policy.pdf')`.
/// The captured argument is returned verbatim; it is a path, not a URL.
pub fn extract_onclick_pdfs(document: &Html) -> Vec<String> {
    let mut discovered = Vec::new();
    let mut seen = HashSet::new();

    for element in document.select(onclick_selector()) {
        let Some(onclick) = element.value().attr("onclick") else {
            continue;
        };

        for captures in onclick_pattern().captures_iter(onclick) {
            let pdf_path = &captures[1];
            if seen.insert(pdf_path.to_string()) {
                tracing::debug!("Found onclick PDF: {}", pdf_path);
                discovered.push(pdf_path.to_string());
            }
        }
    }

    discovered
}

/// Finds anchors pointing at watermark download endpoints
///
/// An href qualifies when it contains both `watermark` and `download.php`,
/// or any of `getpdf`, `showpdf`, `viewpdf`, `downloadpdf` (case-insensitive).
pub fn extract_watermark_hrefs(document: &Html, base_url: &Url) -> Vec<Url> {
    collect_hrefs(document, base_url, |href| {
        let lower = href.to_lowercase();
        (lower.contains("watermark") && lower.contains("download.php"))
            || WATERMARK_HREF_MARKERS
                .iter()
                .any(|marker| lower.contains(marker))
    })
}

/// Finds anchors whose href ends in `.pdf` (case-insensitive)
pub fn extract_direct_pdfs(document: &Html, base_url: &Url) -> Vec<Url> {
    collect_hrefs(document, base_url, |href| {
        href.to_lowercase().ends_with(".pdf")
    })
}

/// Resolves matching anchor hrefs, keeping the first occurrence of each URL
fn collect_hrefs<F>(document: &Html, base_url: &Url, matches: F) -> Vec<Url>
where
    F: Fn(&str) -> bool,
{
    let mut discovered = Vec::new();
    let mut seen = HashSet::new();

    for element in document.select(anchor_selector()) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || !matches(href) {
            continue;
        }

        if let Ok(absolute) = base_url.join(href) {
            if seen.insert(absolute.to_string()) {
                discovered.push(absolute);
            }
        }
    }

    discovered
}

/// Extracts links worth following
///
/// Fragments are dropped, empty and `#` hrefs are skipped, and anything
/// rejected by [`is_crawlable_link`] is left out. Host filtering and
/// de-duplication against the frontier happen in the crawl loop.
pub fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();

    for element in document.select(anchor_selector()) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        let href = href.split('#').next().unwrap_or_default();
        if href.is_empty() {
            continue;
        }

        let Ok(mut absolute) = base_url.join(href) else {
            continue;
        };
        absolute.set_fragment(None);

        if is_crawlable_link(&absolute) {
            links.push(absolute);
        }
    }

    links
}
