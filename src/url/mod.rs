//! URL handling module for Inquire
//!
//! This module provides URL normalization and the scope policies that decide
//! which discovered URLs are eligible for fetching.

mod normalize;
mod scope;

pub use normalize::{normalize_parsed, normalize_url, NormalizeOptions};
pub use scope::{matches_wildcard, DomainPatternMatcher, Matcher, SameHostMatcher};
