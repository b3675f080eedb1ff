//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of crawl results,
//! including statistics, error reports, and the recorded link graph.

use crate::crawler::CrawlStatus;
use crate::output::stats::CrawlStatistics;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Maximum number of nodes listed in the page table
const MAX_LISTED_NODES: usize = 200;

/// Writes a markdown summary of `status` to `output_path`
///
/// # Arguments
///
/// * `status` - The final crawl status
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(io::Error)` - Failed to write summary
pub fn write_markdown_summary(status: &CrawlStatus, output_path: &Path) -> std::io::Result<()> {
    let markdown = format_markdown_summary(status);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl status as markdown
pub fn format_markdown_summary(status: &CrawlStatus) -> String {
    let stats = CrawlStatistics::from_status(status);
    let mut md = String::new();

    // Title
    md.push_str("# Inquire Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    if let Some(started) = &status.started_at {
        md.push_str(&format!("- **Started**: {}\n", started.to_rfc3339()));
    }
    if let Some(finished) = &status.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(elapsed) = status.elapsed() {
        md.push_str(&format!(
            "- **Duration**: {:.2} seconds\n",
            elapsed.num_milliseconds() as f64 / 1000.0
        ));
    }
    let outcome = match status.stop_reason {
        Some(reason) => format!("{:?}", reason),
        None if status.running => "running".to_string(),
        None => "not started".to_string(),
    };
    md.push_str(&format!("- **Stop Reason**: {}\n\n", outcome));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Scheduled URLs**: {}\n", stats.scheduled));
    md.push_str(&format!("- **Nodes**: {}\n", stats.total_nodes));
    md.push_str(&format!("- **Links**: {}\n", stats.total_links));
    md.push_str(&format!("- **Success Rate**: {:.2}%\n\n", stats.success_rate()));

    // State breakdown
    md.push_str("## Node State Breakdown\n\n");
    md.push_str("| State | Count |\n");
    md.push_str("|-------|-------|\n");
    for (state, count) in &stats.nodes_by_state {
        md.push_str(&format!("| {} | {} |\n", state, count));
    }
    md.push('\n');

    if !stats.status_codes.is_empty() {
        md.push_str("## Status Codes\n\n");
        md.push_str("| Code | Count |\n");
        md.push_str("|------|-------|\n");
        for (code, count) in &stats.status_codes {
            md.push_str(&format!("| {} | {} |\n", code, count));
        }
        md.push('\n');
    }

    if !stats.errors.is_empty() {
        md.push_str("## Error Summary\n\n");
        md.push_str("| Error | Count |\n");
        md.push_str("|-------|-------|\n");
        for (error, count) in &stats.errors {
            md.push_str(&format!("| {} | {} |\n", error, count));
        }
        md.push('\n');
    }

    if !status.scheduled_urls.is_empty() {
        md.push_str("## Scheduled URLs\n\n");
        for url in &status.scheduled_urls {
            md.push_str(&format!("1. {}\n", url));
        }
        md.push('\n');
    }

    if !status.nodes.is_empty() {
        md.push_str("## Nodes\n\n");
        md.push_str("| ID | URL | State | Status | Out | In |\n");
        md.push_str("|----|-----|-------|--------|-----|----|\n");
        for node in status.nodes.iter().take(MAX_LISTED_NODES) {
            let code = node
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                node.id, node.url, node.state, code, node.links_out, node.links_in
            ));
        }
        if status.nodes.len() > MAX_LISTED_NODES {
            md.push_str(&format!(
                "\n... and {} more\n",
                status.nodes.len() - MAX_LISTED_NODES
            ));
        }
        md.push('\n');
    }

    md
}
