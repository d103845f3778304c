//! Markdown report generation
//!
//! This module renders a stored run and its documents as a markdown report.

use crate::output::{parse_timestamp, format_timestamp, RunReport};
use crate::TrawlerError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown report of a run to a file
///
/// # Arguments
///
/// * `report` - The run and its documents
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(TrawlerError::Io)` - Failed to write the report
pub fn export_markdown_report(report: &RunReport, output_path: &Path) -> Result<(), TrawlerError> {
    let markdown = format_markdown_report(report);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run report as markdown
pub fn format_markdown_report(report: &RunReport) -> String {
    let run = &report.run;
    let mut md = String::new();

    md.push_str("# PDF-Trawler Crawl Report\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", run.id));
    md.push_str(&format!("- **Start URL**: {}\n", run.start_url));
    md.push_str(&format!(
        "- **Download Directory**: `{}`\n",
        run.download_directory
    ));
    md.push_str(&format!("- **Started**: {}\n", display_time(&run.started_at)));
    if let Some(completed) = &run.completed_at {
        md.push_str(&format!("- **Finished**: {}\n", display_time(completed)));
    }
    if let Some(duration) = report.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Config Hash**: {}\n\n", run.config_hash));

    md.push_str("## Statistics\n\n");
    md.push_str(&format!("- **Pages Crawled**: {}\n", run.pages_crawled));
    md.push_str(&format!("- **PDFs Downloaded**: {}\n", run.pdfs_downloaded));
    md.push_str(&format!(
        "- **Page Limit**: {}\n",
        run.max_pages.map_or("none".to_string(), |v| v.to_string())
    ));
    md.push_str(&format!(
        "- **PDF Limit**: {}\n\n",
        run.max_pdfs.map_or("none".to_string(), |v| v.to_string())
    ));

    md.push_str("## Documents\n\n");
    if report.documents.is_empty() {
        md.push_str("No documents were downloaded.\n");
        return md;
    }

    md.push_str("| Filename | Size | Downloaded | Method | Source Page |\n");
    md.push_str("|----------|------|------------|--------|-------------|\n");
    for document in &report.documents {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            escape_cell(&document.filename),
            document.size_label(),
            document.downloaded_at,
            document.method,
            escape_cell(&document.source_page)
        ));
    }

    md
}

fn display_time(value: &str) -> String {
    parse_timestamp(value)
        .map(|timestamp| format_timestamp(&timestamp))
        .unwrap_or_else(|| value.to_string())
}

/// Escapes pipes so a value cannot break the table layout
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}
