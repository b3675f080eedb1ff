//! Status snapshots of a crawl, readable while it runs

use crate::crawler::scheduler::{ScheduleProgress, StopReason};
use crate::graph::{NodeView, Recorder};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// A point-in-time view of a crawl
#[derive(Debug, Clone)]
pub struct CrawlStatus {
    /// True between the start of `run` and its return
    pub running: bool,

    /// Number of distinct URLs the scheduler has accepted
    pub scheduled_count: usize,

    /// Every recorded node, newest first
    pub nodes: Vec<NodeView>,

    /// Scheduled URLs in the order they were accepted
    pub scheduled_urls: Vec<String>,

    pub edge_count: usize,

    /// Set once the scheduler has stopped
    pub stop_reason: Option<StopReason>,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlStatus {
    /// Number of nodes that have a recorded response
    pub fn fetched_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.status_code.is_some()).count()
    }

    /// Number of nodes whose fetch failed without a response
    pub fn failed_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.status_code.is_none() && n.error.is_some())
            .count()
    }

    /// Wall-clock duration of the run, if it has finished
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct RunClock {
    running: bool,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// Cloneable handle producing [`CrawlStatus`] snapshots
#[derive(Clone)]
pub struct StatusHandle {
    recorder: Arc<Recorder>,
    progress: watch::Receiver<ScheduleProgress>,
    clock: Arc<Mutex<RunClock>>,
}

impl StatusHandle {
    pub(crate) fn new(recorder: Arc<Recorder>, progress: watch::Receiver<ScheduleProgress>) -> Self {
        Self {
            recorder,
            progress,
            clock: Arc::new(Mutex::new(RunClock::default())),
        }
    }

    fn clock(&self) -> std::sync::MutexGuard<'_, RunClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark_started(&self) {
        let mut clock = self.clock();
        clock.running = true;
        clock.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_finished(&self) {
        let mut clock = self.clock();
        clock.running = false;
        clock.finished_at = Some(Utc::now());
    }

    pub fn is_running(&self) -> bool {
        self.clock().running
    }

    /// Takes a snapshot of the recorder and scheduler progress
    pub fn snapshot(&self) -> CrawlStatus {
        let (scheduled_urls, stop_reason) = {
            let progress = self.progress.borrow();
            (progress.scheduled.clone(), progress.stop_reason)
        };
        let (running, started_at, finished_at) = {
            let clock = self.clock();
            (clock.running, clock.started_at, clock.finished_at)
        };

        CrawlStatus {
            running,
            scheduled_count: scheduled_urls.len(),
            nodes: self.recorder.node_views(),
            scheduled_urls,
            edge_count: self.recorder.edge_count(),
            stop_reason,
            started_at,
            finished_at,
        }
    }
}
