//! Integration tests for the crawler
//!
//! Most tests drive the coordinator with an in-memory fetch engine so runs are
//! deterministic. The last group uses wiremock to exercise the HTTP engine and
//! the full crawl cycle end-to-end.

use async_trait::async_trait;
use inquire::config::{Config, UserAgentConfig};
use inquire::crawler::{
    build_http_client, run_crawl, Coordinator, CrawlOptions, Document, EngineError,
    FetchCompletion, FetchEngine, Fetched, HttpFetchEngine, ResponseHandler, StopReason,
    WorkTicket,
};
use inquire::graph::{FetchError, NodeState, ResponseData};
use inquire::InquireError;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// How the in-memory engine treats submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Serve pages from the site map
    Serve,
    /// Accept submissions but never finish a fetch
    Stall,
    /// Refuse every submission
    Reject,
}

/// Fetch engine serving HTML from a fixed map of URL to body
struct FakeEngine {
    pages: HashMap<String, String>,
    mode: Mode,
    handler: OnceLock<Arc<dyn ResponseHandler>>,
    queue_tx: mpsc::UnboundedSender<(Url, TaskTrackerToken)>,
    queue_rx: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<(Url, TaskTrackerToken)>>>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    submitted: Mutex<Vec<String>>,
    cancels: AtomicUsize,
}

impl FakeEngine {
    fn new(mode: Mode, pages: &[(&str, &str)]) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
            mode,
            handler: OnceLock::new(),
            queue_tx,
            queue_rx: tokio::sync::Mutex::new(Some(queue_rx)),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            submitted: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        })
    }

    fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    fn fetch(&self, url: &Url) -> Result<Fetched, FetchError> {
        let body = self
            .pages
            .get(url.as_str())
            .ok_or_else(|| FetchError::Connect(format!("no route to {}", url)))?;
        Ok(Fetched {
            response: ResponseData {
                status_code: 200,
                headers: HeaderMap::new(),
                content_length: Some(body.len() as u64),
                fetch_duration: Duration::from_millis(1),
            },
            document: Some(Document {
                url: url.clone(),
                content_type: Some("text/html".to_string()),
                body: body.clone(),
            }),
        })
    }
}

#[async_trait]
impl FetchEngine for FakeEngine {
    fn register(&self, handler: Arc<dyn ResponseHandler>) -> Result<(), EngineError> {
        self.handler
            .set(handler)
            .map_err(|_| EngineError::HandlerAlreadyRegistered)
    }

    fn submit(&self, url: Url) -> Result<(), EngineError> {
        if self.mode == Mode::Reject {
            return Err(EngineError::Closed);
        }
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        self.submitted.lock().unwrap().push(url.to_string());
        self.queue_tx
            .send((url, self.tracker.token()))
            .map_err(|_| EngineError::Closed)
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
    }

    async fn block(&self) {
        let mut queue = self.queue_rx.lock().await.take().unwrap();
        let handler = self.handler.get().cloned().unwrap();
        self.tracker.close();

        loop {
            let (url, token) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                job = queue.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                _ = self.tracker.wait() => break,
            };

            if self.mode == Mode::Stall {
                let cancel = self.cancel.clone();
                self.tracker.spawn(async move {
                    let _token = token;
                    cancel.cancelled().await;
                });
                continue;
            }

            let outcome = self.fetch(&url);
            let handler = handler.clone();
            self.tracker.spawn(async move {
                handler
                    .on_response(FetchCompletion {
                        url,
                        outcome,
                        ticket: WorkTicket::tracked(token),
                    })
                    .await;
            });
        }

        queue.close();
        while queue.try_recv().is_ok() {}
        self.tracker.wait().await;
    }
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn links(hrefs: &[&str]) -> String {
    let anchors: String = hrefs
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!("<html><body>{}</body></html>", anchors)
}

/// A 200 response carrying `body` as `text/html`
fn html_page(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

async fn run_to_end(coordinator: &mut Coordinator) -> Result<StopReason, InquireError> {
    tokio::time::timeout(Duration::from_secs(10), coordinator.run())
        .await
        .expect("crawl should finish")
}

#[tokio::test]
async fn test_crawl_records_all_links_but_schedules_in_scope_only() {
    let home = links(&["/a", "http://other.test/b"]);
    let a = links(&[]);
    let engine = FakeEngine::new(
        Mode::Serve,
        &[("http://x.test/", &home), ("http://x.test/a", &a)],
    );
    let options = CrawlOptions::new(url("http://x.test/"), 3);
    let mut coordinator = Coordinator::new(options, engine.clone());

    let reason = run_to_end(&mut coordinator).await.unwrap();
    assert_eq!(reason, StopReason::ChannelClosed);

    let recorder = coordinator.recorder();
    assert_eq!(recorder.node_count(), 3);
    assert_eq!(recorder.edge_count(), 2);
    assert!(recorder.has_edge(&url("http://x.test/"), &url("http://x.test/a")));
    assert!(recorder.has_edge(&url("http://x.test/"), &url("http://other.test/b")));

    assert_eq!(engine.submitted(), vec!["http://x.test/", "http://x.test/a"]);
    assert_eq!(engine.cancels(), 0);

    let status = coordinator.status();
    assert!(!status.running);
    assert_eq!(status.scheduled_count, 1);
    assert_eq!(status.scheduled_urls, vec!["http://x.test/a"]);
    assert_eq!(status.edge_count, 2);
    assert_eq!(status.stop_reason, Some(StopReason::ChannelClosed));
    assert!(status.started_at.is_some());
    assert!(status.finished_at.is_some());

    let other = recorder.node(&url("http://other.test/b")).unwrap();
    assert_eq!(other.state(), NodeState::Discovered);
    let a = recorder.node(&url("http://x.test/a")).unwrap();
    assert_eq!(a.state(), NodeState::Fetched);
}

#[tokio::test]
async fn test_crawl_fetches_each_url_once() {
    let home = links(&["/a", "/b", "/a#top"]);
    let a = links(&["/b", "/"]);
    let b = links(&["/a", "/b/"]);
    let engine = FakeEngine::new(
        Mode::Serve,
        &[
            ("http://x.test/", &home),
            ("http://x.test/a", &a),
            ("http://x.test/b", &b),
        ],
    );
    let mut coordinator = Coordinator::new(CrawlOptions::new(url("http://x.test/"), 10), engine.clone());

    run_to_end(&mut coordinator).await.unwrap();

    let mut submitted = engine.submitted();
    submitted.sort();
    assert_eq!(
        submitted,
        vec!["http://x.test/", "http://x.test/a", "http://x.test/b"]
    );

    let recorder = coordinator.recorder();
    assert_eq!(recorder.node_count(), 3);
    // "/" -> a, "/" -> b, a -> b, a -> "/", b -> a; b -> "/b/" is a self-link
    assert_eq!(recorder.edge_count(), 5);
    assert_eq!(coordinator.status().scheduled_count, 2);
}

#[tokio::test]
async fn test_crawl_stops_at_bound() {
    let hrefs: Vec<String> = (0..10).map(|i| format!("/p{}", i)).collect();
    let hrefs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
    let home = links(&hrefs);
    let engine = FakeEngine::new(Mode::Serve, &[("http://x.test/", &home)]);
    let mut coordinator = Coordinator::new(CrawlOptions::new(url("http://x.test/"), 3), engine.clone());

    let reason = run_to_end(&mut coordinator).await.unwrap();

    assert_eq!(reason, StopReason::BoundReached);
    assert_eq!(engine.submitted().len(), 4);
    assert_eq!(engine.cancels(), 1);

    let status = coordinator.status();
    assert_eq!(status.scheduled_count, 3);
    // Every link is recorded regardless of the bound
    assert_eq!(status.nodes.len(), 11);
    assert_eq!(status.edge_count, 10);
}

#[tokio::test]
async fn test_shutdown_cancels_engine_once() {
    let engine = FakeEngine::new(Mode::Stall, &[]);
    let mut coordinator = Coordinator::new(CrawlOptions::new(url("http://x.test/"), 10), engine.clone());
    let shutdown = coordinator.shutdown_token();
    let status = coordinator.status_handle();

    let crawl = tokio::spawn(async move {
        let reason = coordinator.run().await;
        (coordinator, reason)
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(status.is_running());
    shutdown.cancel();

    let (coordinator, reason) = tokio::time::timeout(Duration::from_secs(5), crawl)
        .await
        .expect("crawl should stop promptly")
        .unwrap();

    assert_eq!(reason.unwrap(), StopReason::Shutdown);
    assert_eq!(engine.cancels(), 1);
    assert_eq!(engine.submitted(), vec!["http://x.test/"]);

    let snapshot = coordinator.status();
    assert!(!snapshot.running);
    assert_eq!(snapshot.stop_reason, Some(StopReason::Shutdown));
    assert_eq!(snapshot.nodes.len(), 0);
}

#[tokio::test]
async fn test_seed_rejection_is_fatal() {
    let engine = FakeEngine::new(Mode::Reject, &[]);
    let mut coordinator = Coordinator::new(CrawlOptions::new(url("http://x.test/"), 10), engine);

    let err = run_to_end(&mut coordinator).await.unwrap_err();
    assert!(matches!(
        err,
        InquireError::SeedRejected {
            source: EngineError::Closed,
            ..
        }
    ));
    assert!(!coordinator.status().running);

    let again = coordinator.run().await.unwrap_err();
    assert!(matches!(again, InquireError::AlreadyRunning));
}

#[tokio::test]
async fn test_failed_fetch_is_recorded() {
    let home = links(&["/gone"]);
    let engine = FakeEngine::new(Mode::Serve, &[("http://x.test/", &home)]);
    let mut coordinator = Coordinator::new(CrawlOptions::new(url("http://x.test/"), 10), engine);

    run_to_end(&mut coordinator).await.unwrap();

    let gone = coordinator.recorder().node(&url("http://x.test/gone")).unwrap();
    assert_eq!(gone.state(), NodeState::Failed);
    assert!(matches!(gone.error(), Some(FetchError::Connect(_))));
}

#[tokio::test]
async fn test_same_host_spans_schemes() {
    let home = links(&["https://x.test/a", "https://other.test/b"]);
    let engine = FakeEngine::new(Mode::Serve, &[("http://x.test/", &home)]);
    let mut coordinator = Coordinator::new(CrawlOptions::new(url("http://x.test/"), 10), engine.clone());

    run_to_end(&mut coordinator).await.unwrap();

    assert_eq!(engine.submitted(), vec!["http://x.test/", "https://x.test/a"]);
    assert_eq!(coordinator.status().scheduled_count, 1);
}

#[tokio::test]
async fn test_stripped_seed_is_not_fetched_twice() {
    let home = links(&["/?lang=en", "/?lang=de", "/b"]);
    let engine = FakeEngine::new(Mode::Serve, &[("http://x.test/", &home)]);

    let mut config = Config::default();
    config.crawler.seed = Some("http://x.test/?lang=en".to_string());
    config.links.strip_query = true;
    let options = CrawlOptions::from_config(&config).unwrap();
    let mut coordinator = Coordinator::new(options, engine.clone());

    run_to_end(&mut coordinator).await.unwrap();

    assert_eq!(engine.submitted(), vec!["http://x.test/", "http://x.test/b"]);
    let recorder = coordinator.recorder();
    assert_eq!(recorder.node_count(), 2);
    assert!(recorder.node(&url("http://x.test/?lang=en")).is_none());
}

#[tokio::test]
async fn test_custom_matcher() {
    let home = links(&["/keep/1", "/skip/1"]);
    let engine = FakeEngine::new(Mode::Serve, &[("http://x.test/", &home)]);
    let matcher = |_seed: &Url, candidate: &Url| candidate.path().starts_with("/keep");
    let options = CrawlOptions::new(url("http://x.test/"), 10).with_matcher(Arc::new(matcher));
    let mut coordinator = Coordinator::new(options, engine.clone());

    run_to_end(&mut coordinator).await.unwrap();

    assert_eq!(
        engine.submitted(),
        vec!["http://x.test/", "http://x.test/keep/1"]
    );
}

#[tokio::test]
async fn test_http_engine_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            html_page(links(&["/page1", "/missing", "http://elsewhere.test/x"])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(
            html_page(links(&["/"])),
        )
        .mount(&mock_server)
        .await;

    let seed = inquire::normalize_url(&base_url).unwrap();
    let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(5)).unwrap();
    let engine = Arc::new(HttpFetchEngine::new(client, 4));
    let mut coordinator = Coordinator::new(CrawlOptions::new(seed.clone(), 10), engine);

    let reason = run_to_end(&mut coordinator).await.unwrap();
    assert_eq!(reason, StopReason::ChannelClosed);

    let recorder = coordinator.recorder();
    assert_eq!(recorder.node_count(), 4);

    let home = recorder.node(&seed).unwrap();
    assert_eq!(home.response().unwrap().status_code, 200);

    let page1 = recorder.node(&seed.join("/page1").unwrap()).unwrap();
    assert_eq!(page1.response().unwrap().status_code, 200);
    assert!(recorder.has_edge(page1.url(), &seed));

    let missing = recorder.node(&seed.join("/missing").unwrap()).unwrap();
    assert_eq!(missing.response().unwrap().status_code, 404);

    let elsewhere = recorder.node(&url("http://elsewhere.test/x")).unwrap();
    assert_eq!(elsewhere.state(), NodeState::Discovered);

    assert_eq!(coordinator.status().scheduled_count, 2);
}

#[tokio::test]
async fn test_run_crawl_from_config() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            html_page(links(&["/about?utm_source=home"])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(
            html_page(links(&[])),
        )
        .mount(&mock_server)
        .await;

    let mut config = Config::default();
    config.crawler.seed = Some(mock_server.uri());
    config.crawler.max_scheduled = 5;

    let status = tokio::time::timeout(
        Duration::from_secs(10),
        run_crawl(config, CancellationToken::new()),
    )
    .await
    .expect("crawl should finish")
    .unwrap();

    assert!(!status.running);
    assert_eq!(status.stop_reason, Some(StopReason::ChannelClosed));
    assert_eq!(status.nodes.len(), 2);
    assert_eq!(status.scheduled_urls, vec![format!("{}/about", mock_server.uri())]);
    assert!(status.elapsed().is_some());
}
