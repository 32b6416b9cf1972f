// Tests for the crawl -> observe -> merge pipeline

use apiscout_core::discover::{DiscoveryOptions, execute_discovery_with};
use apiscout_scanner::error::Result;
use apiscout_scanner::{NetworkObserver, ObservationMap, PageObservation};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Observer that pretends every page called `<origin>/api/data` plus a third-party tracker.
struct StubObserver {
    origin: String,
    seen: Arc<Mutex<Vec<String>>>,
}

impl NetworkObserver for StubObserver {
    async fn observe(&self, urls: &[String]) -> Result<ObservationMap> {
        self.seen.lock().unwrap().extend(urls.iter().cloned());

        let mut map = ObservationMap::new();
        for url in urls {
            let api = format!("{}/api/data", self.origin);
            map.insert(
                url.clone(),
                PageObservation {
                    requests: [api.clone()].into_iter().collect(),
                    responses: [api, "https://tracker.example.net/pixel".to_string()]
                        .into_iter()
                        .collect(),
                },
            );
        }
        Ok(map)
    }
}

async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn fast_options(base_url: &str) -> DiscoveryOptions {
    let mut options = DiscoveryOptions::new(base_url);
    options.crawl.delay = Duration::ZERO;
    options.crawl.request_timeout = Duration::from_secs(5);
    options
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_discovery_end_to_end() {
    let server = MockServer::start().await;
    mount_html(&server, "/", r#"<a href="/about">About</a><a href="/stats">Stats</a>"#).await;
    mount_html(&server, "/about", r#"<a href="/">Home</a>"#).await;
    mount_html(&server, "/stats", "<p>numbers</p>").await;

    let base_url = format!("{}/", server.uri());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer = StubObserver {
        origin: server.uri(),
        seen: seen.clone(),
    };

    let report = execute_discovery_with(&observer, fast_options(&base_url), None)
        .await
        .unwrap();

    assert_eq!(report.target, base_url);
    assert_eq!(report.crawled_pages.len(), 3);
    assert!(report.failed_pages.is_empty());
    assert_eq!(report.observations.len(), 3);
    assert_eq!(report.endpoints, vec![format!("{}/api/data", server.uri())]);
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_discovery_observes_only_crawled_pages() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<a href="/ok">ok</a><a href="/gone">gone</a><a href="https://elsewhere.example.org/">x</a>"#,
    )
    .await;
    mount_html(&server, "/ok", "<p>fine</p>").await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let base_url = format!("{}/", server.uri());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer = StubObserver {
        origin: server.uri(),
        seen: seen.clone(),
    };

    let report = execute_discovery_with(&observer, fast_options(&base_url), None)
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|url| url.starts_with(&server.uri())));
    assert!(!seen.iter().any(|url| url.ends_with("/gone")));
    assert_eq!(report.failed_pages.len(), 1);
}

#[tokio::test]
async fn test_discovery_reports_phases() {
    let server = MockServer::start().await;
    mount_html(&server, "/", "<p>lonely</p>").await;

    let base_url = format!("{}/", server.uri());
    let observer = StubObserver {
        origin: server.uri(),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let messages = Arc::new(Mutex::new(Vec::new()));
    let messages_clone = messages.clone();

    execute_discovery_with(
        &observer,
        fast_options(&base_url),
        Some(Arc::new(move |msg: String| {
            messages_clone.lock().unwrap().push(msg);
        })),
    )
    .await
    .unwrap();

    let messages = messages.lock().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with("Starting crawl"));
    assert!(messages[1].contains("1 crawled URLs"));
}

#[tokio::test]
async fn test_discovery_invalid_base_url() {
    let observer = StubObserver {
        origin: String::new(),
        seen: Arc::new(Mutex::new(Vec::new())),
    };

    let result = execute_discovery_with(&observer, fast_options("ftp://nope"), None).await;
    assert!(result.is_err());
}
