//! Frontier scheduler
//!
//! This module handles:
//! - Consuming discovered links from the discovery channel
//! - Applying the scope matcher to each candidate
//! - Deduplicating against everything already scheduled
//! - Enforcing the maximum scheduled-count bound
//! - Submitting eligible URLs to the fetch engine

use crate::crawler::engine::{FetchEngine, WorkTicket};
use crate::url::Matcher;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A link found on a fetched page, waiting for a scheduling decision
#[derive(Debug)]
pub struct Discovered {
    pub url: Url,
    _ticket: WorkTicket,
}

impl Discovered {
    pub fn new(url: Url, ticket: WorkTicket) -> Self {
        Self {
            url,
            _ticket: ticket,
        }
    }
}

/// Lifecycle of the scheduler; `Stopped` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped,
}

/// Why the scheduler loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The schedule set reached the configured maximum
    BoundReached,
    /// The shutdown token was cancelled
    Shutdown,
    /// Every sender of the discovery channel was dropped
    ChannelClosed,
}

/// What happened to one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    OutOfScope,
    AlreadyScheduled,
    Submitted,
    SubmitFailed,
    BoundReached,
}

/// Scheduler state visible to status readers
#[derive(Debug, Clone)]
pub struct ScheduleProgress {
    pub state: SchedulerState,
    pub scheduled: Vec<String>,
    pub stop_reason: Option<StopReason>,
}

/// Turns discovered links into bounded, deduplicated fetch submissions
///
/// The scheduler is owned by exactly one task. The schedule set is plain
/// owned data; the discovery channel is the only thing shared with
/// producers.
pub struct Scheduler {
    seed: Url,
    matcher: Arc<dyn Matcher>,
    max_scheduled: usize,
    schedule: HashSet<String>,
    state: SchedulerState,
    progress: watch::Sender<ScheduleProgress>,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `seed` - The crawl seed, passed to the matcher with every candidate
    /// * `matcher` - The scope policy
    /// * `max_scheduled` - Maximum number of distinct URLs ever submitted
    pub fn new(seed: Url, matcher: Arc<dyn Matcher>, max_scheduled: usize) -> Self {
        let (progress, _) = watch::channel(ScheduleProgress {
            state: SchedulerState::Running,
            scheduled: Vec::new(),
            stop_reason: None,
        });
        Self {
            seed,
            matcher,
            max_scheduled,
            schedule: HashSet::new(),
            state: SchedulerState::Running,
            progress,
        }
    }

    /// Returns a receiver observing the scheduler's progress
    pub fn subscribe(&self) -> watch::Receiver<ScheduleProgress> {
        self.progress.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of distinct URLs scheduled so far
    pub fn scheduled_count(&self) -> usize {
        self.schedule.len()
    }

    pub fn is_scheduled(&self, url: &Url) -> bool {
        self.schedule.contains(url.as_str())
    }

    fn at_bound(&self) -> bool {
        self.schedule.len() >= self.max_scheduled
    }

    /// Decides what to do with one candidate and submits it if eligible
    ///
    /// The bound and dedup checks both run before the engine is contacted, so
    /// the engine never sees more submissions than the bound allows.
    pub fn consider(&mut self, candidate: &Url, engine: &dyn FetchEngine) -> Decision {
        if self.state == SchedulerState::Stopped || self.at_bound() {
            return Decision::BoundReached;
        }

        if !self.matcher.matches(&self.seed, candidate) {
            tracing::debug!("url {} is out of scope, ignoring", candidate);
            return Decision::OutOfScope;
        }

        let key = candidate.as_str();
        if self.schedule.contains(key) {
            tracing::debug!("url {} was already scheduled, ignoring", key);
            return Decision::AlreadyScheduled;
        }

        self.schedule.insert(key.to_string());
        self.progress
            .send_modify(|progress| progress.scheduled.push(key.to_string()));

        match engine.submit(candidate.clone()) {
            Ok(()) => {
                tracing::debug!(
                    "Scheduled url {} for crawling ({}/{})",
                    key,
                    self.schedule.len(),
                    self.max_scheduled
                );
                Decision::Submitted
            }
            Err(e) => {
                tracing::warn!("Failed to submit {}: {}", key, e);
                Decision::SubmitFailed
            }
        }
    }

    /// Consumes the discovery channel until the bound, shutdown, or channel close
    ///
    /// When the bound is reached the scheduler cancels `shutdown` itself so the
    /// orchestrator tears the fetch engine down.
    pub async fn run(
        mut self,
        mut discovered: mpsc::Receiver<Discovered>,
        engine: Arc<dyn FetchEngine>,
        shutdown: CancellationToken,
    ) -> StopReason {
        let reason = loop {
            if self.at_bound() {
                tracing::info!("Maximum scheduled count reached: {}", self.schedule.len());
                break StopReason::BoundReached;
            }

            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break StopReason::Shutdown,
                next = discovered.recv() => next,
            };

            match next {
                Some(candidate) => {
                    self.consider(&candidate.url, engine.as_ref());
                }
                None => break StopReason::ChannelClosed,
            }
        };

        self.stop(reason);
        if reason == StopReason::BoundReached {
            shutdown.cancel();
        }
        reason
    }

    fn stop(&mut self, reason: StopReason) {
        tracing::info!("Shutting down scheduler ({:?})", reason);
        self.state = SchedulerState::Stopped;
        self.progress.send_modify(|progress| {
            progress.state = SchedulerState::Stopped;
            progress.stop_reason = Some(reason);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::engine::{EngineError, ResponseHandler};
    use crate::url::SameHostMatcher;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingEngine {
        submitted: Mutex<Vec<String>>,
        cancels: AtomicUsize,
        reject: bool,
    }

    impl RecordingEngine {
        fn submitted(&self) -> Vec<String> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FetchEngine for RecordingEngine {
        fn register(&self, _handler: Arc<dyn ResponseHandler>) -> Result<(), EngineError> {
            Ok(())
        }

        fn submit(&self, url: Url) -> Result<(), EngineError> {
            if self.reject {
                return Err(EngineError::Closed);
            }
            self.submitted.lock().unwrap().push(url.to_string());
            Ok(())
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }

        async fn block(&self) {}
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn scheduler(max: usize) -> Scheduler {
        Scheduler::new(url("http://x.test/"), Arc::new(SameHostMatcher::new()), max)
    }

    fn discovered(s: &str) -> Discovered {
        Discovered::new(url(s), WorkTicket::untracked())
    }

    #[test]
    fn test_new_scheduler() {
        let s = scheduler(10);
        assert_eq!(s.state(), SchedulerState::Running);
        assert_eq!(s.scheduled_count(), 0);
    }

    #[test]
    fn test_out_of_scope_is_dropped() {
        let engine = RecordingEngine::default();
        let mut s = scheduler(10);

        assert_eq!(
            s.consider(&url("http://other.test/b"), &engine),
            Decision::OutOfScope
        );
        assert_eq!(s.consider(&url("http://x.test/"), &engine), Decision::OutOfScope);
        assert!(engine.submitted().is_empty());
    }

    #[test]
    fn test_duplicate_is_submitted_once() {
        let engine = RecordingEngine::default();
        let mut s = scheduler(10);

        assert_eq!(s.consider(&url("http://x.test/a"), &engine), Decision::Submitted);
        assert_eq!(
            s.consider(&url("http://x.test/a"), &engine),
            Decision::AlreadyScheduled
        );
        assert_eq!(engine.submitted(), vec!["http://x.test/a"]);
        assert!(s.is_scheduled(&url("http://x.test/a")));
    }

    #[test]
    fn test_bound_stops_submissions() {
        let engine = RecordingEngine::default();
        let mut s = scheduler(2);

        assert_eq!(s.consider(&url("http://x.test/a"), &engine), Decision::Submitted);
        assert_eq!(s.consider(&url("http://x.test/b"), &engine), Decision::Submitted);
        assert_eq!(
            s.consider(&url("http://x.test/c"), &engine),
            Decision::BoundReached
        );
        assert_eq!(engine.submitted().len(), 2);
    }

    #[test]
    fn test_submit_failure_is_skipped() {
        let engine = RecordingEngine {
            reject: true,
            ..Default::default()
        };
        let mut s = scheduler(10);

        assert_eq!(
            s.consider(&url("http://x.test/a"), &engine),
            Decision::SubmitFailed
        );
        assert_eq!(
            s.consider(&url("http://x.test/a"), &engine),
            Decision::AlreadyScheduled
        );
        assert_eq!(s.scheduled_count(), 1);
    }

    #[test]
    fn test_progress_is_published() {
        let engine = RecordingEngine::default();
        let mut s = scheduler(10);
        let progress = s.subscribe();

        s.consider(&url("http://x.test/a"), &engine);
        s.consider(&url("http://x.test/b"), &engine);

        assert_eq!(
            progress.borrow().scheduled,
            vec!["http://x.test/a", "http://x.test/b"]
        );
    }

    #[tokio::test]
    async fn test_run_stops_at_bound_and_signals() {
        let engine = Arc::new(RecordingEngine::default());
        let (tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let s = scheduler(2);
        let progress = s.subscribe();

        for path in ["a", "b", "c", "d"] {
            tx.send(discovered(&format!("http://x.test/{}", path)))
                .await
                .unwrap();
        }

        let reason = s.run(rx, engine.clone(), shutdown.clone()).await;

        assert_eq!(reason, StopReason::BoundReached);
        assert!(shutdown.is_cancelled());
        assert_eq!(engine.submitted(), vec!["http://x.test/a", "http://x.test/b"]);
        assert_eq!(engine.cancels.load(Ordering::SeqCst), 0);
        assert_eq!(progress.borrow().state, SchedulerState::Stopped);
        assert_eq!(progress.borrow().stop_reason, Some(StopReason::BoundReached));
    }

    #[tokio::test]
    async fn test_run_observes_shutdown() {
        let engine = Arc::new(RecordingEngine::default());
        let (_tx, rx) = mpsc::channel::<Discovered>(1);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(scheduler(10).run(rx, engine, shutdown.clone()));
        shutdown.cancel();

        let reason = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("scheduler should stop promptly")
            .unwrap();
        assert_eq!(reason, StopReason::Shutdown);
    }

    #[tokio::test]
    async fn test_run_ends_when_channel_closes() {
        let engine = Arc::new(RecordingEngine::default());
        let (tx, rx) = mpsc::channel(4);
        tx.send(discovered("http://x.test/a")).await.unwrap();
        drop(tx);

        let reason = scheduler(10)
            .run(rx, engine.clone(), CancellationToken::new())
            .await;

        assert_eq!(reason, StopReason::ChannelClosed);
        assert_eq!(engine.submitted(), vec!["http://x.test/a"]);
    }
}
