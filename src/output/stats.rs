//! Statistics derived from a crawl status snapshot
//!
//! This module provides functionality for summarizing and displaying
//! a [`CrawlStatus`] on the terminal.

use crate::crawler::CrawlStatus;
use crate::graph::NodeState;
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStatistics {
    /// Total number of nodes in the link graph
    pub total_nodes: usize,

    /// Count of nodes by state
    pub nodes_by_state: BTreeMap<String, usize>,

    /// Count of fetched nodes by HTTP status code
    pub status_codes: BTreeMap<u16, usize>,

    /// Count of failed fetches by error message
    pub errors: BTreeMap<String, usize>,

    /// Total number of distinct links
    pub total_links: usize,

    /// Number of URLs submitted for fetching by the scheduler
    pub scheduled: usize,
}

impl CrawlStatistics {
    /// Computes statistics from a status snapshot
    pub fn from_status(status: &CrawlStatus) -> Self {
        let mut stats = Self {
            total_nodes: status.nodes.len(),
            total_links: status.edge_count,
            scheduled: status.scheduled_count,
            ..Default::default()
        };

        for node in &status.nodes {
            *stats
                .nodes_by_state
                .entry(node.state.to_string())
                .or_default() += 1;

            if let Some(code) = node.status_code {
                *stats.status_codes.entry(code).or_default() += 1;
            }
            if node.state == NodeState::Failed {
                if let Some(error) = &node.error {
                    *stats.errors.entry(error.clone()).or_default() += 1;
                }
            }
        }

        stats
    }

    /// Percentage of fetched nodes that answered with a 2xx status
    pub fn success_rate(&self) -> f64 {
        let fetched: usize = self.status_codes.values().sum();
        if fetched == 0 {
            return 0.0;
        }
        let ok: usize = self
            .status_codes
            .iter()
            .filter(|(code, _)| (200..300).contains(*code))
            .map(|(_, count)| count)
            .sum();
        (ok as f64 / fetched as f64) * 100.0
    }
}

/// Prints a status snapshot to stdout in a formatted manner
///
/// # Arguments
///
/// * `status` - The snapshot to display
pub fn print_status(status: &CrawlStatus) {
    let stats = CrawlStatistics::from_status(status);

    println!("=== Crawl Status ===\n");

    println!("Overview:");
    println!("  Running: {}", status.running);
    if let Some(reason) = status.stop_reason {
        println!("  Stopped: {:?}", reason);
    }
    if let Some(elapsed) = status.elapsed() {
        println!("  Duration: {:.2}s", elapsed.num_milliseconds() as f64 / 1000.0);
    }
    println!("  URLs scheduled: {}", stats.scheduled);
    println!("  Nodes recorded: {}", stats.total_nodes);
    println!("  Links recorded: {}", stats.total_links);
    println!();

    println!("Nodes by State:");
    for (state, count) in &stats.nodes_by_state {
        println!("  {}: {}", state, count);
    }
    println!();

    if !stats.status_codes.is_empty() {
        println!("Status Codes:");
        for (code, count) in &stats.status_codes {
            println!("  {}: {}", code, count);
        }
        println!();
    }

    if !stats.errors.is_empty() {
        println!("Error Summary:");
        let mut errors: Vec<_> = stats.errors.iter().collect();
        errors.sort_by(|a, b| b.1.cmp(a.1));
        for (error, count) in errors {
            println!("  {}: {}", error, count);
        }
        println!();
    }

    println!("Nodes:");
    println!("  {:>5}  {:>6}  {:>4}  {:>4}  URL", "ID", "STATUS", "OUT", "IN");
    for node in &status.nodes {
        let code = node
            .status_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| node.state.to_string());
        println!(
            "  {:>5}  {:>6}  {:>4}  {:>4}  {}",
            node.id.to_string(),
            code,
            node.links_out,
            node.links_in,
            node.url
        );
        if let Some(error) = &node.error {
            println!("  {:>5}  error: {}", "", error);
        }
    }
    println!();

    println!(
        "Success Rate: {:.1}% of fetched pages answered 2xx",
        stats.success_rate()
    );
}
