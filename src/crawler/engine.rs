//! Fetch engine seam
//!
//! The crawl core never performs HTTP itself. It submits URLs to a
//! [`FetchEngine`] and receives each completed fetch through a registered
//! [`ResponseHandler`]. Engines report completions concurrently, one handler
//! call per fetch.

use crate::graph::{FetchError, ResponseData};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::task::task_tracker::TaskTrackerToken;
use url::Url;

/// Errors reported by a fetch engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no response handler registered")]
    NoHandler,

    #[error("a response handler is already registered")]
    HandlerAlreadyRegistered,

    #[error("fetch engine has been cancelled")]
    Cancelled,

    #[error("fetch engine is no longer accepting work")]
    Closed,
}

/// A fetched document handed to the link extractor
#[derive(Debug, Clone)]
pub struct Document {
    /// Effective URL after redirects, used to resolve relative links
    pub url: Url,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    /// Decoded body text
    pub body: String,
}

impl Document {
    /// Returns true if the Content-Type says HTML, or there is none
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(true, |ct| ct.to_ascii_lowercase().contains("text/html"))
    }
}

/// A fetch that produced a response
#[derive(Debug, Clone)]
pub struct Fetched {
    pub response: ResponseData,

    /// Body, when the engine read one
    pub document: Option<Document>,
}

/// Keeps an engine from reporting itself idle while work derived from a
/// completion is still pending
///
/// An engine hands one ticket out with every completion. Whoever receives it
/// may clone it onto follow-up work; the engine counts as busy until every
/// clone is dropped.
#[derive(Default)]
pub struct WorkTicket(Option<TaskTrackerToken>);

impl WorkTicket {
    /// A ticket counted by a `TaskTracker`
    pub fn tracked(token: TaskTrackerToken) -> Self {
        Self(Some(token))
    }

    /// A ticket that holds nothing open
    pub fn untracked() -> Self {
        Self(None)
    }
}

impl Clone for WorkTicket {
    fn clone(&self) -> Self {
        Self(self.0.as_ref().map(|token| token.task_tracker().token()))
    }
}

impl fmt::Debug for WorkTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkTicket")
            .field(&self.0.is_some())
            .finish()
    }
}

/// The outcome of one submitted fetch
#[derive(Debug)]
pub struct FetchCompletion {
    /// The URL as it was submitted
    pub url: Url,

    pub outcome: Result<Fetched, FetchError>,

    pub ticket: WorkTicket,
}

/// Receives completed fetches from an engine
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    async fn on_response(&self, completion: FetchCompletion);
}

/// An engine that fetches submitted URLs on its own worker pool
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// Registers the handler every completion is delivered to
    fn register(&self, handler: Arc<dyn ResponseHandler>) -> Result<(), EngineError>;

    /// Queues `url` for fetching without waiting for it
    fn submit(&self, url: Url) -> Result<(), EngineError>;

    /// Aborts outstanding and future work; calling it again has no effect
    fn cancel(&self);

    /// Runs until the engine is idle or cancelled
    async fn block(&self);
}
