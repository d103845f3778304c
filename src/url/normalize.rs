use crate::UrlError;
use url::{ParseError, Url};

/// Normalizes a user-supplied start URL into a fully qualified crawl root
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Parse the URL; a bare `host/path` is retried as `http://host/path`
/// 3. Reject schemes other than http and https
/// 4. Reject URLs without a host
///
/// # Examples
///
/// ```
/// use pdf_trawler::url::normalize_start_url;
///
/// let url = normalize_start_url("example.com/docs").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/docs");
/// ```
pub fn normalize_start_url(raw: &str) -> Result<Url, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::MissingDomain);
    }

    let url = match Url::parse(raw) {
        Ok(url) if is_http(&url) => url,
        // "localhost:8080" parses with scheme "localhost"
        Ok(url) if looks_like_host_port(raw, url.scheme()) => {
            parse_with_default_scheme(raw).map_err(|_| invalid_scheme(&url))?
        }
        Ok(url) => return Err(invalid_scheme(&url)),
        Err(ParseError::RelativeUrlWithoutBase) => {
            parse_with_default_scheme(raw).map_err(|e| UrlError::Parse(e.to_string()))?
        }
        Err(ParseError::EmptyHost) => return Err(UrlError::MissingDomain),
        Err(e) => return Err(UrlError::Parse(e.to_string())),
    };

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingDomain),
    }
}

fn parse_with_default_scheme(raw: &str) -> Result<Url, ParseError> {
    let raw = raw.trim_start_matches('/');
    Url::parse(&format!("http://{}", raw))
}

fn looks_like_host_port(raw: &str, scheme: &str) -> bool {
    !raw.contains("://")
        && raw
            .get(scheme.len() + 1..)
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}

fn is_http(url: &Url) -> bool {
    url.scheme() == "http" || url.scheme() == "https"
}

fn invalid_scheme(url: &Url) -> UrlError {
    UrlError::InvalidScheme(format!(
        "Only HTTP and HTTPS schemes are supported, got: {}",
        url.scheme()
    ))
}
