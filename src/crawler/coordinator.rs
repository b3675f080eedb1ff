//! Crawler coordinator - main crawl orchestration logic
//!
//! This module wires the crawl together:
//! - Registering the response hook with the fetch engine
//! - Submitting the seed
//! - Running the scheduler task and the engine loop side by side
//! - Recording every response and link in the graph
//! - Tearing everything down on the bound, a shutdown signal, or quiescence

use crate::config::Config;
use crate::crawler::engine::{FetchCompletion, FetchEngine, ResponseHandler};
use crate::crawler::extractor::{HtmlLinkExtractor, LinkExtractor};
use crate::crawler::fetcher::HttpFetchEngine;
use crate::crawler::scheduler::{Discovered, Scheduler, StopReason};
use crate::crawler::status::{CrawlStatus, StatusHandle};
use crate::graph::Recorder;
use crate::url::{normalize_parsed, Matcher, SameHostMatcher};
use crate::{InquireError, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Default capacity of the discovery channel
pub const DEFAULT_DISCOVERY_CAPACITY: usize = 64;

/// Everything a crawl needs apart from the fetch engine
#[derive(Clone)]
pub struct CrawlOptions {
    pub seed: Url,
    pub max_scheduled: usize,
    pub discovery_capacity: usize,
    pub matcher: Arc<dyn Matcher>,
    pub extractor: Arc<dyn LinkExtractor>,
}

impl CrawlOptions {
    /// Options with the same-host scope and the HTML extractor
    pub fn new(seed: Url, max_scheduled: usize) -> Self {
        Self {
            seed,
            max_scheduled,
            discovery_capacity: DEFAULT_DISCOVERY_CAPACITY,
            matcher: Arc::new(SameHostMatcher::new()),
            extractor: Arc::new(HtmlLinkExtractor::default()),
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn LinkExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_discovery_capacity(mut self, capacity: usize) -> Self {
        self.discovery_capacity = capacity;
        self
    }

    /// Builds options from a validated configuration
    ///
    /// The seed is normalized with the same options as extracted links, so a
    /// page linking back to the seed resolves to the seed's own key.
    pub fn from_config(config: &Config) -> Result<Self> {
        let seed = config.crawler.seed.as_deref().ok_or_else(|| {
            crate::ConfigError::Validation("no seed URL configured".to_string())
        })?;
        let normalize = config.links.normalize_options();
        let seed = normalize_parsed(Url::parse(seed)?, normalize)?;

        Ok(Self::new(seed, config.crawler.max_scheduled)
            .with_discovery_capacity(config.crawler.discovery_capacity)
            .with_matcher(config.scope.build_matcher())
            .with_extractor(Arc::new(HtmlLinkExtractor::new(normalize))))
    }
}

/// Response hook registered with the fetch engine
struct CrawlHook {
    recorder: Arc<Recorder>,
    extractor: Arc<dyn LinkExtractor>,
    discovered: Mutex<Option<mpsc::Sender<Discovered>>>,
    shutdown: CancellationToken,
}

impl CrawlHook {
    fn sender(&self) -> Option<mpsc::Sender<Discovered>> {
        self.discovered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drops the hook's sender so the scheduler sees the channel close
    fn close(&self) {
        self.discovered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[async_trait]
impl ResponseHandler for CrawlHook {
    async fn on_response(&self, completion: FetchCompletion) {
        let FetchCompletion {
            url,
            outcome,
            ticket,
        } = completion;

        let (response, document, error) = match outcome {
            Ok(fetched) => (Some(fetched.response), fetched.document, None),
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", url, e);
                (None, None, Some(e))
            }
        };

        let parent = self.recorder.record_response(&url, response, error);

        let Some(document) = document else {
            return;
        };

        let links = match self.extractor.extract(&document) {
            Ok(links) => links,
            Err(e) => {
                tracing::debug!("No links extracted from {}: {}", url, e);
                return;
            }
        };

        tracing::debug!("Found {} links on {}", links.len(), url);
        for link in &links {
            self.recorder.record_link(&parent, link);
        }

        let Some(sender) = self.sender() else {
            return;
        };
        for link in links {
            let candidate = Discovered::new(link, ticket.clone());
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                sent = sender.send(candidate) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    seed: Url,
    recorder: Arc<Recorder>,
    extractor: Arc<dyn LinkExtractor>,
    scheduler: Option<Scheduler>,
    engine: Arc<dyn FetchEngine>,
    discovery_capacity: usize,
    shutdown: CancellationToken,
    status: StatusHandle,
}

impl Coordinator {
    /// Creates a new coordinator with its own shutdown token
    pub fn new(options: CrawlOptions, engine: Arc<dyn FetchEngine>) -> Self {
        Self::with_shutdown(options, engine, CancellationToken::new())
    }

    /// Creates a new coordinator stopped by `parent` as well as its own token
    ///
    /// Reaching the bound cancels only the coordinator's child token, never
    /// `parent`.
    pub fn with_shutdown(
        options: CrawlOptions,
        engine: Arc<dyn FetchEngine>,
        parent: CancellationToken,
    ) -> Self {
        let recorder = Arc::new(Recorder::new());
        let scheduler = Scheduler::new(
            options.seed.clone(),
            options.matcher,
            options.max_scheduled,
        );
        let status = StatusHandle::new(recorder.clone(), scheduler.subscribe());

        Self {
            seed: options.seed,
            recorder,
            extractor: options.extractor,
            scheduler: Some(scheduler),
            engine,
            discovery_capacity: options.discovery_capacity.max(1),
            shutdown: parent.child_token(),
            status,
        }
    }

    /// Token that stops the crawl when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn status(&self) -> CrawlStatus {
        self.status.snapshot()
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    /// Runs the crawl to completion
    ///
    /// # Returns
    ///
    /// * `Ok(StopReason)` - Why the crawl ended
    /// * `Err(InquireError::SeedRejected)` - The engine refused the seed
    /// * `Err(InquireError::AlreadyRunning)` - `run` was called before
    pub async fn run(&mut self) -> Result<StopReason> {
        let scheduler = self.scheduler.take().ok_or(InquireError::AlreadyRunning)?;
        self.status.mark_started();

        let result = self.drive(scheduler).await;

        self.status.mark_finished();
        result
    }

    async fn drive(&self, scheduler: Scheduler) -> Result<StopReason> {
        let (tx, rx) = mpsc::channel(self.discovery_capacity);
        let hook = Arc::new(CrawlHook {
            recorder: self.recorder.clone(),
            extractor: self.extractor.clone(),
            discovered: Mutex::new(Some(tx)),
            shutdown: self.shutdown.clone(),
        });
        self.engine.register(hook.clone())?;

        tracing::info!("Starting crawl from {}", self.seed);
        if let Err(source) = self.engine.submit(self.seed.clone()) {
            tracing::error!("Fetch engine rejected seed {}: {}", self.seed, source);
            return Err(InquireError::SeedRejected {
                url: self.seed.to_string(),
                source,
            });
        }

        let scheduler = tokio::spawn(scheduler.run(
            rx,
            self.engine.clone(),
            self.shutdown.clone(),
        ));

        let engine = self.engine.clone();
        let block = engine.block();
        tokio::pin!(block);

        let idle = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = &mut block => true,
        };

        let mut engine_cancelled = false;
        if !idle {
            self.engine.cancel();
            engine_cancelled = true;
            block.await;
        } else {
            tracing::info!("Frontier exhausted");
        }

        hook.close();
        let reason = scheduler
            .await
            .map_err(|e| InquireError::Task(e.to_string()))?;

        // The bound may be reached just as the engine goes idle
        if self.shutdown.is_cancelled() && !engine_cancelled {
            self.engine.cancel();
        }

        tracing::info!(
            "Crawl finished ({:?}): {} nodes, {} edges",
            reason,
            self.recorder.node_count(),
            self.recorder.edge_count()
        );
        Ok(reason)
    }
}

/// Runs a complete crawl from configuration with the HTTP engine
///
/// This is the main entry point used by the binary. Cancelling `shutdown`
/// stops the crawl early.
///
/// # Arguments
///
/// * `config` - The validated crawler configuration
/// * `shutdown` - Stops the crawl when cancelled
///
/// # Returns
///
/// * `Ok(CrawlStatus)` - Final status of the crawl
/// * `Err(InquireError)` - Crawl could not be started
pub async fn run_crawl(config: Config, shutdown: CancellationToken) -> Result<CrawlStatus> {
    let options = CrawlOptions::from_config(&config)?;
    let engine = HttpFetchEngine::from_config(&config.crawler, &config.user_agent)?;

    let mut coordinator = Coordinator::with_shutdown(options, Arc::new(engine), shutdown);
    coordinator.run().await?;
    Ok(coordinator.status())
}
