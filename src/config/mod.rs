//! Configuration module for Inquire
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use inquire::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("inquire.toml")).unwrap();
//! println!("Crawler will schedule at most {} URLs", config.crawler.max_scheduled);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, LinksConfig, OutputConfig, ScopeConfig, ScopePolicy, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, effective_config_hash, load_config, load_config_with_hash, parse_config,
};
pub use validation::{validate, validate_seed};
