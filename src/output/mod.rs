//! Output module for generating crawl summaries and reports
//!
//! This module handles:
//! - Printing a crawl status to the terminal
//! - Generating markdown summaries of crawl results

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use stats::{print_status, CrawlStatistics};
