//! Scope policies deciding which discovered URLs may be fetched
//!
//! A [`Matcher`] is a pure predicate over the crawl seed and a candidate.
//! Implementations hold only immutable configuration, so a single instance
//! can be shared by reference across any number of tasks.

use url::Url;

/// Decides whether a candidate URL is eligible to be fetched
pub trait Matcher: Send + Sync {
    /// Returns true if `candidate` may be scheduled for a crawl seeded at `seed`
    fn matches(&self, seed: &Url, candidate: &Url) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&Url, &Url) -> bool + Send + Sync,
{
    fn matches(&self, seed: &Url, candidate: &Url) -> bool {
        self(seed, candidate)
    }
}

/// Never leaves the seed's host
///
/// Two URLs share a host when their host names and explicit ports are equal.
/// The scheme is ignored, so `http://example.com/` and `https://example.com/a`
/// match each other while `http://example.com:8080/` does not.
#[derive(Debug, Clone, Copy)]
pub struct SameHostMatcher {
    skip_seed: bool,
}

impl SameHostMatcher {
    /// Creates a matcher that rejects the seed itself
    pub fn new() -> Self {
        Self { skip_seed: true }
    }

    /// Controls whether the seed URL itself is rejected
    pub fn with_skip_seed(mut self, skip_seed: bool) -> Self {
        self.skip_seed = skip_seed;
        self
    }
}

impl Default for SameHostMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher for SameHostMatcher {
    fn matches(&self, seed: &Url, candidate: &Url) -> bool {
        if self.skip_seed && seed.as_str() == candidate.as_str() {
            return false;
        }
        same_host(seed, candidate)
    }
}

/// Accepts candidates whose host matches one of a list of domain patterns
///
/// Patterns are either exact (`example.com`) or wildcards (`*.example.com`),
/// the latter matching the bare domain and any subdomain.
#[derive(Debug, Clone)]
pub struct DomainPatternMatcher {
    patterns: Vec<String>,
    skip_seed: bool,
}

impl DomainPatternMatcher {
    /// Creates a matcher over the given patterns; patterns are lowercased
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
            skip_seed: true,
        }
    }

    /// Controls whether the seed URL itself is rejected
    pub fn with_skip_seed(mut self, skip_seed: bool) -> Self {
        self.skip_seed = skip_seed;
        self
    }
}

impl Matcher for DomainPatternMatcher {
    fn matches(&self, seed: &Url, candidate: &Url) -> bool {
        if self.skip_seed && seed.as_str() == candidate.as_str() {
            return false;
        }
        let Some(host) = candidate.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        self.patterns
            .iter()
            .any(|pattern| matches_wildcard(pattern, &host))
    }
}

/// Compares the host and any explicit port; `url` already drops default ports
fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str().is_some() && a.host_str() == b.host_str() && a.port() == b.port()
}

/// Checks if a domain matches a wildcard pattern
///
/// # Examples
///
/// ```
/// use inquire::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "blog.example.com"));
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}
