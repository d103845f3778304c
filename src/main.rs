//! PDF-Trawler main entry point
//!
//! This is the command-line interface for the PDF-Trawler site harvester.

use clap::Parser;
use pdf_trawler::config::{load_config_with_hash, Config};
use pdf_trawler::crawler::{Coordinator, CrawlRequest, Fetcher};
use pdf_trawler::output::{
    export_markdown_report, load_latest_report, load_statistics, print_crawl_summary,
    print_statistics,
};
use pdf_trawler::state::TracingSink;
use pdf_trawler::storage::{open_storage, RunSummary, Storage};
use pdf_trawler::url::{derive_download_directory, normalize_start_url, AllowedHosts};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Number of runs listed by `--stats`
const STATS_RUN_LIMIT: usize = 20;

/// PDF-Trawler: a single-site PDF harvester
///
/// PDF-Trawler crawls one web site breadth-first and downloads every PDF it
/// can find, whether linked directly, opened through an `onclick` handler or
/// served by a watermarking download endpoint.
#[derive(Parser, Debug)]
#[command(name = "pdf-trawler")]
#[command(version)]
#[command(about = "A single-site PDF harvester", long_about = None)]
struct Cli {
    /// Site to crawl (scheme optional, defaults to http)
    #[arg(value_name = "URL", required_unless_present_any = ["stats", "export_summary"])]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop after crawling this many pages
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    max_pages: Option<u64>,

    /// Stop after downloading this many PDFs
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    max_pdfs: Option<u64>,

    /// Do not record the run in the database
    #[arg(long)]
    no_db: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate settings and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show recorded runs from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Write a markdown report of the latest recorded run to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export_summary: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match &cli.config {
        Some(path) => tracing::info!("Loading configuration from: {}", path.display()),
        None => tracing::info!("No configuration file given, using defaults"),
    }
    let (config, config_hash) = match load_config_with_hash(cli.config.as_deref()) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.stats {
        return handle_stats(&config);
    }
    if let Some(path) = &cli.export_summary {
        return handle_export_summary(&config, path);
    }

    let raw_url = cli.url.as_deref().ok_or("A URL is required to start crawling")?;
    let start_url = match normalize_start_url(raw_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Invalid start URL {:?}: {}", raw_url, e);
            return Err(e.into());
        }
    };
    let request = build_request(&config, &cli, start_url)?;

    if cli.dry_run {
        handle_dry_run(&config, &request);
        Ok(())
    } else {
        handle_crawl(&config, &config_hash, request, cli.no_db).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pdf_trawler=info,warn"),
            1 => EnvFilter::new("pdf_trawler=debug,info"),
            2 => EnvFilter::new("pdf_trawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Builds the crawl request from configuration and command-line limits
fn build_request(
    config: &Config,
    cli: &Cli,
    start_url: Url,
) -> Result<CrawlRequest, Box<dyn std::error::Error>> {
    let destination =
        derive_download_directory(Path::new(&config.output.download_root), &start_url);
    let allowed_hosts = AllowedHosts::for_start_url(&start_url);

    Ok(CrawlRequest::from_config(start_url, destination, &config.crawler)
        .with_allowed_hosts(allowed_hosts)
        .with_max_pages(cli.max_pages.map(usize::try_from).transpose()?)
        .with_max_pdfs(cli.max_pdfs.map(usize::try_from).transpose()?))
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config, request: &CrawlRequest) {
    println!("=== PDF-Trawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Attempts per fetch: {}", config.crawler.retries);
    println!("  Retry delay: {}s", config.crawler.retry_delay);
    println!("  Page timeout: {}s", config.crawler.page_timeout);
    println!("  Watermark timeout: {}s", config.crawler.watermark_timeout);
    println!("  Direct timeout: {}s", config.crawler.direct_timeout);
    println!("  Verify SSL: {}", config.crawler.verify_ssl);

    println!("\nOutput:");
    println!("  Download root: {}", config.output.download_root);
    println!("  Database: {}", config.output.database_path);

    println!("\nCrawl:");
    println!("  Start URL: {}", request.start_url);
    println!("  Download directory: {}", request.destination.display());
    println!(
        "  Max pages: {}",
        request
            .max_pages
            .map_or("none".to_string(), |v| v.to_string())
    );
    println!(
        "  Max PDFs: {}",
        request
            .max_pdfs
            .map_or("none".to_string(), |v| v.to_string())
    );

    if let Some(allowed) = &request.allowed_hosts {
        println!("\nAllowed Hosts ({}):", allowed.len());
        for host in allowed.entries() {
            println!("  - {}", host);
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling at {}", request.start_url);
}

/// Handles the --stats mode: lists recorded runs
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage, STATS_RUN_LIMIT)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: writes a markdown report of the latest run
fn handle_export_summary(config: &Config, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Exporting Crawl Report ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", output.display());
    println!();

    let storage = open_storage(Path::new(&config.output.database_path))?;

    tracing::info!("Loading latest run from database...");
    let report = load_latest_report(&storage)?;

    tracing::info!("Generating markdown report...");
    export_markdown_report(&report, output)?;

    println!("✓ Report exported to: {}", output.display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    request: CrawlRequest,
    no_db: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = Fetcher::from_config(&config.crawler)?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current step");
            ctrl_c_token.cancel();
        }
    });

    let outcome = Coordinator::new(request.clone(), &fetcher)
        .with_cancellation(cancel)
        .run(&TracingSink)
        .await;

    print_crawl_summary(&request, &outcome);

    if no_db {
        tracing::info!("Skipping database (--no-db)");
        return Ok(());
    }

    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    let summary = RunSummary::from_outcome(&request, &outcome, config_hash);
    let run_id = storage.record_run(&summary, &outcome.documents)?;
    tracing::info!(
        "Recorded run {} in {}",
        run_id,
        config.output.database_path
    );

    Ok(())
}
