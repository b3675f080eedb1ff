//! Crawler module for frontier scheduling and crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - The fetch engine seam and its HTTP implementation
//! - HTML link extraction
//! - Bounded, deduplicated scheduling of discovered links
//! - Overall crawl coordination and status snapshots

mod coordinator;
mod engine;
mod extractor;
mod fetcher;
mod scheduler;
mod status;

pub use coordinator::{run_crawl, Coordinator, CrawlOptions, DEFAULT_DISCOVERY_CAPACITY};
pub use engine::{
    Document, EngineError, FetchCompletion, FetchEngine, Fetched, ResponseHandler, WorkTicket,
};
pub use extractor::{ExtractError, HtmlLinkExtractor, LinkExtractor};
pub use fetcher::{build_http_client, fetch_url, HttpFetchEngine};
pub use scheduler::{
    Decision, Discovered, ScheduleProgress, Scheduler, SchedulerState, StopReason,
};
pub use status::{CrawlStatus, StatusHandle};
