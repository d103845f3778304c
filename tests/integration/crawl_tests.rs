//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use chrono::{DateTime, Utc};
use pdf_trawler::crawler::{
    build_http_client, crawl_and_download, Coordinator, CrawlRequest, Fetcher, RetryPolicy,
};
use pdf_trawler::state::{CrawlState, DiscoveryMethod, NoopSink, ProgressEvent};
use pdf_trawler::storage::{RunSummary, SqliteStorage, Storage};
use pdf_trawler::url::AllowedHosts;
use sha1::{Digest, Sha1};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::rustls::{Certificate, PrivateKey, ServerConfig};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A minimal document that passes PDF validation
fn pdf_bytes(label: &str) -> Vec<u8> {
    format!(
        "%PDF-1.4\n% {}\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n",
        label
    )
    .into_bytes()
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

fn pdf_response(label: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(pdf_bytes(label), "application/pdf")
}

/// Fetcher that retries without sleeping
fn test_fetcher(attempts: u32) -> Fetcher {
    Fetcher::new(true, RetryPolicy::new(attempts, Duration::ZERO))
        .expect("Failed to build fetcher")
}

fn start_url(server: &MockServer, page: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), page)).expect("Failed to parse mock URL")
}

fn site_request(server: &MockServer, page: &str, destination: &Path) -> CrawlRequest {
    let start = start_url(server, page);
    let allowed = AllowedHosts::for_start_url(&start);
    CrawlRequest::new(start, destination).with_allowed_hosts(allowed)
}

/// Sink that keeps every event for later inspection
fn recording_sink() -> (
    Arc<Mutex<Vec<ProgressEvent>>>,
    impl Fn(&ProgressEvent) -> anyhow::Result<()> + Send + Sync,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let sink = move |event: &ProgressEvent| {
        sink_events.lock().unwrap().push(event.clone());
        Ok(())
    };
    (events, sink)
}

/// Cancels `token` after `delay` on a background task
fn cancel_after(token: &CancellationToken, delay: Duration) {
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
}

/// Serves `body` as HTML over HTTPS with a self-signed certificate
///
/// Returns the server URL and a counter of requests that completed the
/// TLS handshake and were answered.
async fn start_self_signed_server(body: &'static str) -> (Url, Arc<AtomicUsize>) {
    let cert = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()])
        .expect("Failed to generate certificate");
    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(
            vec![Certificate(cert.serialize_der().expect("Failed to encode certificate"))],
            PrivateKey(cert.serialize_private_key_der()),
        )
        .expect("Failed to build TLS config");
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let served = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&served);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                // Verifying clients abort the handshake here
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };

                let mut request = Vec::new();
                let mut buffer = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match tls.read(&mut buffer).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buffer[..n]),
                    }
                }

                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = tls.write_all(response.as_bytes()).await;
                let _ = tls.shutdown().await;
            });
        }
    });

    (
        Url::parse(&format!("https://127.0.0.1:{}/", port)).unwrap(),
        served,
    )
}

#[tokio::test]
async fn test_direct_pdf_download() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="report.pdf">Annual report</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(pdf_response("report"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;

    assert_eq!(outcome.documents.len(), 1);
    let record = &outcome.documents[0];
    assert_eq!(record.method, DiscoveryMethod::Direct);
    assert_eq!(record.filename, "report.pdf");
    assert_eq!(record.url, format!("{}/report.pdf", mock_server.uri()));
    assert_eq!(record.source_page, format!("{}/", mock_server.uri()));
    assert_eq!(record.path, dir.path().join("report.pdf"));
    assert_eq!(std::fs::read(&record.path).unwrap(), pdf_bytes("report"));

    assert_eq!(outcome.metadata.pages_crawled, 1);
    assert!(outcome.metadata.finished_at.is_some());
}

#[tokio::test]
async fn test_onclick_pdf_uses_watermark_endpoint() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html_page(
            r#"<button onclick="downloadWithWatermark('pdf/Policy/Laptop.pdf')">Laptop policy</button>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/watermark/download.php"))
        .and(query_param("show", "Policy/Laptop"))
        .and(header("referer", format!("{}/docs", mock_server.uri()).as_str()))
        .respond_with(pdf_response("laptop"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/docs", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;

    assert_eq!(outcome.documents.len(), 1);
    let record = &outcome.documents[0];
    assert_eq!(record.method, DiscoveryMethod::Onclick);
    assert_eq!(record.url, "pdf/Policy/Laptop.pdf");
    assert_eq!(record.filename, "Laptop.pdf");
    assert!(record.path.exists());
}

#[tokio::test]
async fn test_debug_output_stripped_before_pdf() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/files/noisy.pdf">Noisy</a>"#))
        .mount(&mock_server)
        .await;

    let mut body = b"Debug: File found...\nDebug: ready\n".to_vec();
    body.extend_from_slice(&pdf_bytes("noisy"));
    Mock::given(method("GET"))
        .and(path("/files/noisy.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/pdf"))
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;

    assert_eq!(outcome.documents.len(), 1);
    let written = std::fs::read(&outcome.documents[0].path).unwrap();
    assert!(written.starts_with(b"%PDF-1.4"));
    assert_eq!(written, pdf_bytes("noisy"));
}

#[tokio::test]
async fn test_shared_pdf_downloaded_once() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<a href="/files/shared.pdf">Shared</a><a href="/second">Second page</a>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/second"))
        .respond_with(html_page(r#"<a href="/files/shared.pdf">Shared again</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/shared.pdf"))
        .respond_with(pdf_response("shared"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;

    assert_eq!(outcome.metadata.pages_crawled, 2);
    assert_eq!(outcome.documents.len(), 1);
    assert_eq!(outcome.documents[0].filename, "shared.pdf");
}

#[tokio::test]
async fn test_allow_list_blocks_other_hosts() {
    let mock_server = MockServer::start().await;
    let other_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // Same address, different host name, so only the allow-list tells them apart
    let other_port = Url::parse(&other_server.uri()).unwrap().port().unwrap();
    let other_base = format!("http://localhost:{}", other_port);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&format!(
            r#"<a href="{0}/doc.pdf">Off-site PDF</a><a href="{0}/page">Off-site page</a>"#,
            other_base
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(pdf_response("other"))
        .expect(0)
        .mount(&other_server)
        .await;

    let start = start_url(&mock_server, "/");
    let allowed = AllowedHosts::new([format!(
        "{}:{}",
        start.host_str().unwrap(),
        start.port().unwrap()
    )]);
    let request = CrawlRequest::new(start, dir.path()).with_allowed_hosts(allowed);

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(request, &fetcher, &NoopSink).await;

    assert!(outcome.documents.is_empty());
    assert_eq!(outcome.metadata.pages_crawled, 1);
}

#[tokio::test]
async fn test_max_pages_stops_after_one_page() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<a href="/a">A</a><a href="/b">B</a><a href="/c">C</a>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    for page in ["/a", "/b", "/c"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html_page("leaf"))
            .expect(0)
            .mount(&mock_server)
            .await;
    }

    let fetcher = test_fetcher(1);
    let request = site_request(&mock_server, "/", dir.path()).with_max_pages(Some(1));
    let outcome = crawl_and_download(request, &fetcher, &NoopSink).await;

    assert_eq!(outcome.metadata.pages_crawled, 1);
}

#[tokio::test]
async fn test_page_fetch_retried_after_server_error() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="report.pdf">Report</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(pdf_response("report"))
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(2);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;

    assert_eq!(outcome.documents.len(), 1);
}

#[tokio::test]
async fn test_page_abandoned_after_exhausting_attempts() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(3);
    let (events, sink) = recording_sink();
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &sink,
    )
    .await;

    assert!(outcome.documents.is_empty());
    assert_eq!(outcome.metadata.pages_crawled, 1);

    let events = events.lock().unwrap();
    assert_eq!(events.last().unwrap().state, CrawlState::Completed);
}

#[tokio::test]
async fn test_invalid_pdf_not_written() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<a href="missing-signature.pdf">A</a><a href="truncated.pdf">B</a>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing-signature.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("Access denied", "application/pdf"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/truncated.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("%PDF-1.4\n1 0 obj", "application/pdf"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;

    assert!(outcome.documents.is_empty());
    assert!(!dir.path().join("missing-signature.pdf").exists());
    assert!(!dir.path().join("truncated.pdf").exists());
}

#[tokio::test]
async fn test_existing_file_short_circuits_fetch() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let existing = dir.path().join("report.pdf");
    std::fs::write(&existing, pdf_bytes("from an earlier run")).unwrap();
    let modified: DateTime<Utc> = std::fs::metadata(&existing)
        .unwrap()
        .modified()
        .unwrap()
        .into();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="report.pdf">Report</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(pdf_response("new"))
        .mount(&mock_server)
        .await;

    // The name is taken, so the download lands on the hash-suffixed path
    let fetcher = test_fetcher(1);
    let first = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;
    assert_eq!(first.documents.len(), 1);
    let suffixed = first.documents[0].path.clone();
    assert_ne!(suffixed, existing);
    assert!(first.documents[0].filename.starts_with("report_"));
    assert_eq!(std::fs::read(&existing).unwrap(), pdf_bytes("from an earlier run"));

    // A second run finds the suffixed file and does not fetch again
    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="report.pdf">Report</a>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(pdf_response("newer"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let second = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;
    assert_eq!(second.documents.len(), 1);
    assert_eq!(second.documents[0].path, suffixed);

    let suffixed_modified: DateTime<Utc> = std::fs::metadata(&suffixed)
        .unwrap()
        .modified()
        .unwrap()
        .into();
    assert_eq!(second.documents[0].downloaded_at, suffixed_modified);
    assert!(modified <= suffixed_modified);
}

#[tokio::test]
async fn test_watermark_href_download() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<a href="watermark11/download.php?show=Nomination of Offrs">Nomination</a>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/watermark11/download.php"))
        .and(query_param("show", "Nomination of Offrs"))
        .and(header("referer", format!("{}/", mock_server.uri()).as_str()))
        .respond_with(pdf_response("nomination"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;

    assert_eq!(outcome.documents.len(), 1);
    let record = &outcome.documents[0];
    assert_eq!(record.method, DiscoveryMethod::WatermarkHref);
    assert_eq!(record.filename, "Nomination_of_Offrs.pdf");
}

#[tokio::test]
async fn test_watermark_content_disposition_overrides_name() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/watermark/download.php?show=Circular42">Circular</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/watermark/download.php"))
        .and(query_param("show", "Circular42"))
        .respond_with(
            pdf_response("circular")
                .insert_header("content-disposition", r#"attachment; filename="Circular 42.pdf""#),
        )
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;

    assert_eq!(outcome.documents.len(), 1);
    assert_eq!(outcome.documents[0].filename, "Circular_42.pdf");
    assert!(dir.path().join("Circular_42.pdf").exists());
}

#[tokio::test]
async fn test_watermark_html_error_page_rejected() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<a href="watermark/download.php?show=Secret">Secret</a>"#,
        ))
        .mount(&mock_server)
        .await;

    // An HTML body that happens to mention the signature must still be rejected
    Mock::given(method("GET"))
        .and(path("/watermark/download.php"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body>Login required. Expected %PDF- output. %%EOF</body></html>",
            "text/html",
        ))
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;

    assert!(outcome.documents.is_empty());
}

#[tokio::test]
async fn test_max_pdfs_cuts_off_later_categories() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"
            <a onclick="openPDF('pdf/first.pdf')">First</a>
            <a onclick="openPDF('pdf/second.pdf')">Second</a>
            <a href="direct.pdf">Direct</a>
            <a href="/next">Next</a>
            "#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/watermark/download.php"))
        .and(query_param("show", "first"))
        .respond_with(pdf_response("first"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/watermark/download.php"))
        .and(query_param("show", "second"))
        .respond_with(pdf_response("second"))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/direct.pdf"))
        .respond_with(pdf_response("direct"))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html_page("next"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let request = site_request(&mock_server, "/", dir.path()).with_max_pdfs(Some(1));
    let outcome = crawl_and_download(request, &fetcher, &NoopSink).await;

    assert_eq!(outcome.documents.len(), 1);
    assert_eq!(outcome.documents[0].filename, "first.pdf");
    assert_eq!(outcome.metadata.pages_crawled, 1);
}

#[tokio::test]
async fn test_progress_events() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<a href="report.pdf">Report</a><a href="/more">More</a>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/more"))
        .respond_with(html_page("nothing here"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(pdf_response("report"))
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let (events, sink) = recording_sink();
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &sink,
    )
    .await;
    assert_eq!(outcome.documents.len(), 1);

    let events = events.lock().unwrap();
    let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();

    assert_eq!(messages[0], "Crawling started");
    assert_eq!(events[0].state, CrawlState::Running);
    assert_eq!(events[0].pages_crawled, 0);
    assert_eq!(events[0].website, format!("{}/", mock_server.uri()));

    assert!(messages.contains(&format!("Crawling page 1: {}/", mock_server.uri()).as_str()));
    assert!(messages.contains(&"Found 1 PDFs on page 1"));
    assert!(messages.contains(&"Downloaded direct PDF: report.pdf"));
    assert!(messages.contains(&"Queued 1 new links"));
    assert!(messages.contains(&format!("Crawling page 2: {}/more", mock_server.uri()).as_str()));

    let last = events.last().unwrap();
    assert_eq!(last.state, CrawlState::Completed);
    assert_eq!(last.message, "Crawl finished successfully.");
    assert_eq!(last.pages_crawled, 2);
    assert_eq!(last.downloaded, 1);
    assert!(events[..events.len() - 1]
        .iter()
        .all(|event| event.state == CrawlState::Running));
}

#[tokio::test]
async fn test_failing_sink_does_not_abort_crawl() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="report.pdf">Report</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(pdf_response("report"))
        .mount(&mock_server)
        .await;

    let failing_sink =
        |_: &ProgressEvent| -> anyhow::Result<()> { Err(anyhow::anyhow!("display gone")) };

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &failing_sink,
    )
    .await;

    assert_eq!(outcome.documents.len(), 1);
}

#[tokio::test]
async fn test_cancelled_run_completes_without_crawling() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(html_page("never"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let fetcher = test_fetcher(1);
    let (events, sink) = recording_sink();
    let outcome = Coordinator::new(site_request(&mock_server, "/", dir.path()), &fetcher)
        .with_cancellation(token)
        .run(&sink)
        .await;

    assert_eq!(outcome.metadata.pages_crawled, 0);
    assert!(outcome.documents.is_empty());
    assert_eq!(events.lock().unwrap().last().unwrap().state, CrawlState::Completed);
}

#[tokio::test]
async fn test_non_html_start_page_skipped() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"links": ["report.pdf"]}"#, "application/json"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;

    assert_eq!(outcome.metadata.pages_crawled, 1);
    assert!(outcome.documents.is_empty());
}

#[tokio::test]
async fn test_crawl_results_recorded_in_database() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("trawler.db");
    let downloads = dir.path().join("pdfs");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="report.pdf">Report</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(pdf_response("report"))
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let request = site_request(&mock_server, "/", &downloads).with_max_pages(Some(5));
    let outcome = crawl_and_download(request.clone(), &fetcher, &NoopSink).await;

    let mut storage = SqliteStorage::new(&db_path).expect("Failed to open database");
    let summary = RunSummary::from_outcome(&request, &outcome, "test-hash");
    let run_id = storage
        .record_run(&summary, &outcome.documents)
        .expect("Failed to record run");

    let run = storage.get_run(run_id).unwrap();
    assert_eq!(run.pages_crawled, 1);
    assert_eq!(run.pdfs_downloaded, 1);
    assert_eq!(run.max_pages, Some(5));
    assert_eq!(run.config_hash, "test-hash");

    let documents = storage.get_documents(run_id).unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].filename, "report.pdf");
    assert_eq!(documents[0].download_method, Some(DiscoveryMethod::Direct));
    assert_eq!(
        documents[0].file_size_bytes,
        Some(pdf_bytes("report").len() as i64)
    );
    assert_eq!(documents[0].sha256.len(), 64);

    assert_eq!(storage.count_runs().unwrap(), 1);
    assert_eq!(storage.count_documents().unwrap(), 1);
}

#[tokio::test]
async fn test_content_disposition_collision_uses_suffixed_path() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let taken = dir.path().join("Circular_42.pdf");
    std::fs::write(&taken, b"kept from an earlier crawl").unwrap();

    let pdf_url = format!("{}/watermark/download.php?show=Circular42", mock_server.uri());
    let digest = hex::encode(Sha1::digest(pdf_url.as_bytes()));
    let suffixed_name = format!("Circular_42_{}.pdf", &digest[..10]);
    let suffixed = dir.path().join(&suffixed_name);
    std::fs::write(&suffixed, b"stale").unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<a href="/watermark/download.php?show=Circular42">Circular</a>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/watermark/download.php"))
        .and(query_param("show", "Circular42"))
        .respond_with(
            pdf_response("circular")
                .insert_header("content-disposition", r#"attachment; filename="Circular 42.pdf""#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(1);
    let outcome = crawl_and_download(
        site_request(&mock_server, "/", dir.path()),
        &fetcher,
        &NoopSink,
    )
    .await;

    assert_eq!(outcome.documents.len(), 1);
    let record = &outcome.documents[0];
    assert_eq!(record.url, pdf_url);
    assert_eq!(record.filename, suffixed_name);
    assert_eq!(record.path, suffixed);

    // The name derived from the query is never written once the header names the file
    assert!(!dir.path().join("Circular42.pdf").exists());
    assert_eq!(std::fs::read(&taken).unwrap(), b"kept from an earlier crawl");
    assert_eq!(std::fs::read(&suffixed).unwrap(), pdf_bytes("circular"));
}

#[tokio::test]
async fn test_cancellation_interrupts_retry_delay() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(true, RetryPolicy::new(3, Duration::from_secs(2)))
        .expect("Failed to build fetcher");
    let token = CancellationToken::new();
    let (events, sink) = recording_sink();

    let started = Instant::now();
    cancel_after(&token, Duration::from_millis(300));
    let outcome = Coordinator::new(site_request(&mock_server, "/", dir.path()), &fetcher)
        .with_cancellation(token)
        .run(&sink)
        .await;

    assert!(
        started.elapsed() < Duration::from_secs(1),
        "cancellation took {:?}",
        started.elapsed()
    );
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
    assert_eq!(outcome.metadata.pages_crawled, 1);
    assert_eq!(events.lock().unwrap().last().unwrap().state, CrawlState::Completed);
}

#[tokio::test]
async fn test_cancellation_interrupts_slow_download() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="slow.pdf">Slow</a><a href="/next">Next</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(pdf_response("slow").set_delay(Duration::from_secs(10)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html_page("next"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(3);
    let token = CancellationToken::new();

    let started = Instant::now();
    cancel_after(&token, Duration::from_millis(300));
    let outcome = Coordinator::new(site_request(&mock_server, "/", dir.path()), &fetcher)
        .with_cancellation(token)
        .run(&NoopSink)
        .await;

    assert!(
        started.elapsed() < Duration::from_secs(3),
        "cancellation took {:?}",
        started.elapsed()
    );
    assert!(outcome.documents.is_empty());
    assert!(!dir.path().join("slow.pdf").exists());
    assert_eq!(outcome.metadata.pages_crawled, 1);
}

#[tokio::test]
async fn test_verifying_client_rejects_self_signed_certificate() {
    let (url, served) = start_self_signed_server("<html><body>secure</body></html>").await;

    let client = build_http_client(true).expect("Failed to build client");
    let result = client.get(url).send().await;

    assert!(result.is_err());
    assert_eq!(served.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_tls_failure_falls_back_to_unverified_client() {
    let (url, served) = start_self_signed_server("<html><body>secure</body></html>").await;

    // A single attempt, so success can only come from the unverified repeat
    let fetcher = Fetcher::new(true, RetryPolicy::new(1, Duration::ZERO))
        .expect("Failed to build fetcher");
    let response = fetcher
        .fetch(&url, Duration::from_secs(5), None, &CancellationToken::new())
        .await
        .expect("Fetch should succeed without verification");

    assert_eq!(response.status, 200);
    assert!(response.is_html());
    assert_eq!(response.body, b"<html><body>secure</body></html>");
    assert_eq!(served.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unverified_fetcher_accepts_self_signed_certificate() {
    let (url, served) = start_self_signed_server("<html><body>secure</body></html>").await;

    let fetcher = Fetcher::new(false, RetryPolicy::new(1, Duration::ZERO))
        .expect("Failed to build fetcher");
    let response = fetcher
        .fetch(&url, Duration::from_secs(5), None, &CancellationToken::new())
        .await
        .expect("Fetch should succeed without verification");

    assert_eq!(response.status, 200);
    assert_eq!(served.load(Ordering::SeqCst), 1);
}
