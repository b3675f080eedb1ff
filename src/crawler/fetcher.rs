//! HTTP fetch engine
//!
//! This module provides the default [`FetchEngine`], including:
//! - Building HTTP clients with proper user agent strings
//! - A bounded worker pool fed by an unbounded submission queue
//! - Response metadata capture and error classification
//! - Idle detection and cancellation

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::engine::{
    Document, EngineError, FetchCompletion, FetchEngine, Fetched, ResponseHandler, WorkTicket,
};
use crate::graph::{FetchError, ResponseData};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;
use url::Url;

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use inquire::config::UserAgentConfig;
/// use inquire::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig::default();
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and captures its response metadata
///
/// The body is read only when the response looks like HTML; other content
/// types are recorded without being downloaded in full.
pub async fn fetch_url(client: &Client, url: &Url) -> Result<Fetched, FetchError> {
    let start = Instant::now();
    let response = client.get(url.clone()).send().await?;

    let status_code = response.status().as_u16();
    let headers = response.headers().clone();
    let final_url = response.url().clone();
    let header_length = response.content_length();

    let content_type = headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let is_html = content_type
        .as_deref()
        .map_or(true, |ct| ct.to_ascii_lowercase().contains("text/html"));

    let (document, content_length) = if is_html {
        let body = response.text().await?;
        let length = header_length.or(Some(body.len() as u64));
        let document = Document {
            url: final_url,
            content_type,
            body,
        };
        (Some(document), length)
    } else {
        (None, header_length)
    };

    Ok(Fetched {
        response: ResponseData {
            status_code,
            headers,
            content_length,
            fetch_duration: start.elapsed(),
        },
        document,
    })
}

/// A queued URL, holding the engine open until it has been fetched
struct QueuedFetch {
    url: Url,
    ticket: TaskTrackerToken,
}

/// Fetches submitted URLs over HTTP with a bounded number of workers
pub struct HttpFetchEngine {
    client: Client,
    handler: OnceLock<Arc<dyn ResponseHandler>>,
    queue_tx: mpsc::UnboundedSender<QueuedFetch>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<QueuedFetch>>>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl HttpFetchEngine {
    /// Creates an engine running at most `max_concurrent` fetches at once
    pub fn new(client: Client, max_concurrent: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            client,
            handler: OnceLock::new(),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Creates an engine from crawler and user agent settings
    pub fn from_config(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(crawler.request_timeout_secs);
        let client = build_http_client(user_agent, timeout)?;
        Ok(Self::new(client, crawler.max_concurrent_fetches as usize))
    }

    fn spawn_fetch(
        &self,
        job: QueuedFetch,
        handler: Arc<dyn ResponseHandler>,
        permit: tokio::sync::OwnedSemaphorePermit,
    ) {
        let client = self.client.clone();
        let cancel = self.cancel.clone();

        self.tracker.spawn(async move {
            let _permit = permit;
            let QueuedFetch { url, ticket } = job;

            tracing::debug!("Fetching {}", url);
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Fetch of {} cancelled", url);
                    return;
                }
                outcome = fetch_url(&client, &url) => outcome,
            };

            match &outcome {
                Ok(fetched) => tracing::debug!(
                    "Fetched {} ({}) in {:?}",
                    url,
                    fetched.response.status_code,
                    fetched.response.fetch_duration
                ),
                Err(e) => tracing::debug!("Fetch of {} failed: {}", url, e),
            }

            handler
                .on_response(FetchCompletion {
                    url,
                    outcome,
                    ticket: WorkTicket::tracked(ticket),
                })
                .await;
        });
    }
}

#[async_trait]
impl FetchEngine for HttpFetchEngine {
    fn register(&self, handler: Arc<dyn ResponseHandler>) -> Result<(), EngineError> {
        self.handler
            .set(handler)
            .map_err(|_| EngineError::HandlerAlreadyRegistered)
    }

    fn submit(&self, url: Url) -> Result<(), EngineError> {
        if self.handler.get().is_none() {
            return Err(EngineError::NoHandler);
        }
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let job = QueuedFetch {
            url,
            ticket: self.tracker.token(),
        };
        self.queue_tx.send(job).map_err(|_| EngineError::Closed)
    }

    fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Cancelling outstanding fetches");
        }
        self.cancel.cancel();
    }

    async fn block(&self) {
        let Some(mut queue) = self.queue_rx.lock().await.take() else {
            tracing::warn!("Fetch engine is already running");
            return;
        };
        let Some(handler) = self.handler.get().cloned() else {
            tracing::error!("Fetch engine started without a response handler");
            return;
        };

        // From here on `wait` resolves as soon as nothing is queued, running,
        // or held open by a ticket.
        self.tracker.close();

        loop {
            let job = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                job = queue.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                _ = self.tracker.wait() => {
                    tracing::debug!("Fetch engine is idle");
                    break;
                }
            };

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            self.spawn_fetch(job, handler.clone(), permit);
        }

        queue.close();
        while queue.try_recv().is_ok() {}
        drop(queue);

        self.tracker.wait().await;
        tracing::debug!("Fetch engine stopped");
    }
}
