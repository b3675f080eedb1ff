//! Inquire: a seed-driven web crawler that maps link relationships
//!
//! This crate implements a crawl frontier: a concurrency-safe link-graph
//! recorder, a single-owner scheduler that bounds and deduplicates fetch
//! submissions, and a pluggable scope policy. HTTP fetching and link
//! extraction sit behind traits with default implementations.

pub mod config;
pub mod crawler;
pub mod graph;
pub mod output;
pub mod url;

use crate::crawler::EngineError;
use thiserror::Error;

/// Main error type for Inquire operations
#[derive(Debug, Error)]
pub enum InquireError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Fetch engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Fetch engine rejected seed {url}: {source}")]
    SeedRejected { url: String, source: EngineError },

    #[error("Crawl has already been started")]
    AlreadyRunning,

    #[error("Crawl task failed: {0}")]
    Task(String),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Inquire operations
pub type Result<T> = std::result::Result<T, InquireError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Coordinator, CrawlOptions, CrawlStatus};
pub use graph::{Node, NodeId, NodeState, Recorder, ResponseData};
pub use url::{normalize_url, DomainPatternMatcher, Matcher, SameHostMatcher};
