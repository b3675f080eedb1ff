//! Node definitions for the link graph
//!
//! A node is created the first time a URL is seen, either as a fetched page
//! or as a link target, and keeps its identity for the rest of the run.

use reqwest::header::HeaderMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Dense identifier assigned to a node at first sighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Returns the position of this node in creation order
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Metadata captured from a completed HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseData {
    /// HTTP status code
    pub status_code: u16,

    /// Response headers
    pub headers: HeaderMap,

    /// Body length in bytes, from Content-Length or the bytes read
    pub content_length: Option<u64>,

    /// Time from sending the request to receiving the body
    pub fetch_duration: Duration,
}

impl ResponseData {
    /// Returns the Content-Type header value, if present and valid UTF-8
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Transport-level failure attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("redirect failed: {0}")]
    Redirect(String),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_redirect() {
            Self::Redirect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// The fetch state of a node, derived from what has been recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Linked to but never fetched
    Discovered,

    /// A response was recorded
    Fetched,

    /// The fetch failed before a response arrived
    Failed,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discovered => "discovered",
            Self::Fetched => "fetched",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One distinct URL in the link graph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) url: Url,
    pub(crate) response: Option<ResponseData>,
    pub(crate) error: Option<FetchError>,
}

impl Node {
    pub(crate) fn discovered(id: NodeId, url: Url) -> Self {
        Self {
            id,
            url,
            response: None,
            error: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn response(&self) -> Option<&ResponseData> {
        self.response.as_ref()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    pub fn state(&self) -> NodeState {
        match (&self.response, &self.error) {
            (Some(_), _) => NodeState::Fetched,
            (None, Some(_)) => NodeState::Failed,
            (None, None) => NodeState::Discovered,
        }
    }

    /// Attaches a fetch result unless a response is already recorded
    ///
    /// Returns true if anything changed.
    pub(crate) fn record(
        &mut self,
        response: Option<ResponseData>,
        error: Option<FetchError>,
    ) -> bool {
        if self.response.is_some() {
            return false;
        }
        match (response, error) {
            (Some(response), error) => {
                self.response = Some(response);
                self.error = error;
                true
            }
            (None, Some(error)) if self.error.is_none() => {
                self.error = Some(error);
                true
            }
            _ => false,
        }
    }
}

/// Flattened, display-oriented view of a node for status snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub id: NodeId,
    pub url: String,
    pub state: NodeState,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub fetch_duration: Option<Duration>,
    pub error: Option<String>,
    pub links_out: usize,
    pub links_in: usize,
}
