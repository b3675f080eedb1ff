//! Link extraction from fetched documents
//!
//! This module turns a fetched HTML document into the set of candidate links
//! the crawl records and offers to the scheduler.

use crate::crawler::engine::Document;
use crate::url::{normalize_parsed, NormalizeOptions};
use scraper::{Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Reasons a document yields no links
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("document is not HTML ({0})")]
    NotHtml(String),

    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Produces normalized candidate links from a fetched document
pub trait LinkExtractor: Send + Sync {
    /// Returns absolute, normalized, fragment-free URLs without duplicates,
    /// in the order they first appear
    fn extract(&self, document: &Document) -> Result<Vec<Url>, ExtractError>;
}

/// Extracts links from HTML with `scraper`
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only references
/// - Anything that is not HTTP(S) after resolution
///
/// `rel="nofollow"` links are followed.
#[derive(Debug, Clone, Default)]
pub struct HtmlLinkExtractor {
    options: NormalizeOptions,
}

impl HtmlLinkExtractor {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract(&self, document: &Document) -> Result<Vec<Url>, ExtractError> {
        if !document.is_html() {
            return Err(ExtractError::NotHtml(
                document.content_type.clone().unwrap_or_default(),
            ));
        }

        let html = Html::parse_document(&document.body);
        let hrefs = collect_hrefs(&html)?;

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for href in hrefs {
            let Some(resolved) = resolve_link(href, &document.url) else {
                continue;
            };
            match normalize_parsed(resolved, self.options) {
                Ok(link) => {
                    if seen.insert(link.as_str().to_string()) {
                        links.push(link);
                    }
                }
                Err(e) => tracing::debug!("Skipping link {}: {}", href, e),
            }
        }

        Ok(links)
    }
}

/// Collects raw href values from anchors and canonical links
fn collect_hrefs(document: &Html) -> Result<Vec<&str>, ExtractError> {
    let anchors = Selector::parse("a[href]").map_err(|e| ExtractError::Malformed(e.to_string()))?;
    let canonical = Selector::parse("link[rel='canonical'][href]")
        .map_err(|e| ExtractError::Malformed(e.to_string()))?;

    let mut hrefs: Vec<&str> = document
        .select(&anchors)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"))
        .collect();

    hrefs.extend(
        document
            .select(&canonical)
            .filter_map(|element| element.value().attr("href")),
    );

    Ok(hrefs)
}

/// Resolves a link href against the document URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only and empty references
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    matches!(absolute_url.scheme(), "http" | "https").then_some(absolute_url)
}
