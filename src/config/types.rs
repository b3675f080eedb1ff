use crate::url::{DomainPatternMatcher, Matcher, NormalizeOptions, SameHostMatcher};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Main configuration structure for Inquire
///
/// Every section is optional; missing values fall back to their defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub scope: ScopeConfig,
    pub links: LinksConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// URL the crawl starts from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,

    /// Maximum number of distinct URLs scheduled for fetching
    #[serde(rename = "max-scheduled")]
    pub max_scheduled: usize,

    /// Capacity of the channel carrying discovered links to the scheduler
    #[serde(rename = "discovery-capacity")]
    pub discovery_capacity: usize,

    /// Maximum number of concurrent page fetches
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: u32,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_scheduled: 100,
            discovery_capacity: crate::crawler::DEFAULT_DISCOVERY_CAPACITY,
            max_concurrent_fetches: 8,
            request_timeout_secs: 30,
        }
    }
}

/// Which scope policy decides whether a discovered link is followed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopePolicy {
    /// Same host and port as the seed
    #[default]
    SameHost,

    /// Host matches one of the `allow` patterns
    DomainPatterns,
}

/// Scope configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub policy: ScopePolicy,

    /// Never schedule the seed URL again
    #[serde(rename = "skip-seed")]
    pub skip_seed: bool,

    /// Domain patterns (e.g., "example.com" or "*.example.com")
    pub allow: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            policy: ScopePolicy::SameHost,
            skip_seed: true,
            allow: Vec::new(),
        }
    }
}

impl ScopeConfig {
    /// Builds the matcher this configuration describes
    pub fn build_matcher(&self) -> Arc<dyn Matcher> {
        match self.policy {
            ScopePolicy::SameHost => {
                Arc::new(SameHostMatcher::new().with_skip_seed(self.skip_seed))
            }
            ScopePolicy::DomainPatterns => Arc::new(
                DomainPatternMatcher::new(&self.allow).with_skip_seed(self.skip_seed),
            ),
        }
    }
}

/// Link normalization configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Drop the whole query string from discovered links
    #[serde(rename = "strip-query")]
    pub strip_query: bool,
}

impl LinksConfig {
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            strip_query: self.strip_query,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "Inquire".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: String::new(),
            contact_email: String::new(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header, e.g. `Inquire/0.1.0 (+https://example.com/about; admin@example.com)`
    pub fn header_value(&self) -> String {
        let contact: Vec<String> = [
            (!self.contact_url.is_empty()).then(|| format!("+{}", self.contact_url)),
            (!self.contact_email.is_empty()).then(|| self.contact_email.clone()),
        ]
        .into_iter()
        .flatten()
        .collect();

        if contact.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} ({})",
                self.crawler_name,
                self.crawler_version,
                contact.join("; ")
            )
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the markdown summary file
    #[serde(rename = "summary-path", skip_serializing_if = "Option::is_none")]
    pub summary_path: Option<String>,
}
