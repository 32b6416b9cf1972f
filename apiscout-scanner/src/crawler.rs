use crate::error::Result;
use crate::normalize::{
    has_no_extension, is_http_url, is_in_scope, normalize_url, resolve_link, validate_base_url,
};
use crate::result::CrawlOutcome;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Called with the running count of fetched pages and the URL being fetched.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CRAWL_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub request_timeout: Duration,
    /// Pause after every successful fetch.
    pub delay: Duration,
    /// Stop dequeuing once this many pages have been visited.
    pub max_pages: Option<usize>,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            delay: Duration::from_millis(DEFAULT_CRAWL_DELAY_MS),
            max_pages: None,
            user_agent: format!(
                "apiscout/{} (https://github.com/trapdoorsec/apiscout)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

/// Sequential same-scope crawler.
///
/// Frontier, visited and failed sets live only for the duration of a single
/// [`Crawler::crawl`] call, so one crawler can be reused for several runs.
pub struct Crawler {
    client: Client,
    config: CrawlConfig,
    progress_callback: Option<ProgressCallback>,
}

/// Per-run crawl state.
struct Frontier {
    pending: Vec<String>,
    visited: BTreeSet<String>,
    failed: BTreeSet<String>,
}

impl Frontier {
    fn new(start: &str) -> Self {
        Self {
            pending: vec![start.to_string()],
            visited: BTreeSet::new(),
            failed: BTreeSet::new(),
        }
    }

    fn is_known(&self, normalized: &str) -> bool {
        self.visited.contains(normalized) || self.failed.contains(normalized)
    }
}

impl Crawler {
    pub fn new() -> Self {
        Self::with_config(CrawlConfig::default())
    }

    pub fn with_config(config: CrawlConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            progress_callback: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl every extension-less page reachable from `base_url` whose URL
    /// starts with `base_url`.
    ///
    /// Fetch failures are recorded in [`CrawlOutcome::failed`] and never
    /// retried; only an invalid `base_url` is an error.
    pub async fn crawl(&self, base_url: &str) -> Result<CrawlOutcome> {
        validate_base_url(base_url)?;
        info!("Starting crawl of {}", base_url);

        let start = Instant::now();
        let mut frontier = Frontier::new(base_url);
        let mut outcome = CrawlOutcome::new(base_url.to_string());

        while let Some(current) = frontier.pending.pop() {
            if let Some(max_pages) = self.config.max_pages
                && frontier.visited.len() >= max_pages
            {
                info!("Reached page limit of {}, stopping crawl", max_pages);
                break;
            }

            let normalized = normalize_url(&current);
            if frontier.is_known(&normalized) {
                continue;
            }

            if let Some(ref callback) = self.progress_callback {
                callback(frontier.visited.len() + frontier.failed.len() + 1, current.clone());
            }

            let body = match self.fetch(&current).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Failed to fetch {}: {}", current, e);
                    frontier.failed.insert(normalized);
                    continue;
                }
            };

            frontier.visited.insert(normalized);
            outcome.pages.push(current.clone());

            for link in extract_links(&body, &current) {
                if !is_http_url(&link) {
                    continue;
                }

                let normalized_link = normalize_url(&link);
                if frontier.is_known(&normalized_link) {
                    continue;
                }

                if !is_in_scope(&link, base_url) {
                    debug!("  -> Out of scope, skipping {}", link);
                    continue;
                }

                if !has_no_extension(&link) {
                    debug!("  -> Has file extension, skipping {}", link);
                    continue;
                }

                debug!("  -> Queuing {}", link);
                frontier.pending.push(link);
            }

            if !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        outcome.visited = frontier.visited;
        outcome.failed = frontier.failed;
        outcome.elapsed = start.elapsed();

        info!(
            "Crawled {} URLs ({} failed) in {:.2} seconds",
            outcome.visited_count(),
            outcome.failed_count(),
            outcome.elapsed.as_secs_f64()
        );
        Ok(outcome)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute URLs of every `<a href>` in `html`, resolved against `current_url`.
pub fn extract_links(html: &str, current_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]").unwrap();

    document
        .select(&link_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(current_url, href))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn html_page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(format!("<html><body>{}</body></html>", body))
    }

    async fn mount_page(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html_page(body))
            .mount(server)
            .await;
    }

    fn fast_crawler() -> Crawler {
        Crawler::new().with_delay(Duration::ZERO)
    }

    #[test]
    fn test_extract_links_resolves_relative() {
        let html = r#"<a href="/about">About</a><a href="team">Team</a><a>none</a>"#;
        let links = extract_links(html, "https://x.com/company/");
        assert_eq!(
            links,
            vec!["https://x.com/about", "https://x.com/company/team"]
        );
    }

    /// Three-page site: `/`, `/about` linking back to `/`, and `/data.csv`.
    #[tokio::test]
    async fn test_three_page_site() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<a href="/about">About</a><a href="/data.csv">Data</a>"#,
        )
        .await;
        mount_page(&server, "/about", r#"<a href="/">Home</a>"#).await;
        Mock::given(method("GET"))
            .and(path("/data.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n1,2\n"))
            .expect(0)
            .mount(&server)
            .await;

        let base = server.uri();
        let outcome = fast_crawler().crawl(&base).await.unwrap();

        let expected: BTreeSet<String> =
            [base.clone(), format!("{}/about", base)].into_iter().collect();
        assert_eq!(outcome.visited, expected);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.pages.len(), 2);
    }

    #[tokio::test]
    async fn test_out_of_scope_links_are_never_enqueued() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<a href="https://evil.com/x">Elsewhere</a><a href="/in">In</a>"#,
        )
        .await;
        mount_page(&server, "/in", "leaf").await;

        let outcome = fast_crawler().crawl(&server.uri()).await.unwrap();
        assert_eq!(outcome.visited.len(), 2);
        assert!(outcome.visited.iter().all(|u| u.starts_with(&server.uri())));
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn test_failed_urls_are_not_retried() {
        let server = MockServer::start().await;
        mount_page(&server, "/", r#"<a href="/a">A</a><a href="/missing">Missing</a>"#).await;
        mount_page(
            &server,
            "/a",
            r#"<a href="/missing?from=a">Missing</a><a href="/missing/">Again</a>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = fast_crawler().crawl(&server.uri()).await.unwrap();
        assert_eq!(outcome.visited.len(), 2);
        assert_eq!(
            outcome.failed.into_iter().collect::<Vec<_>>(),
            vec![format!("{}/missing", server.uri())]
        );
    }

    #[tokio::test]
    async fn test_each_normalized_url_visited_once() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<a href="/p">P</a><a href="/p/">P slash</a><a href="/p?x=1">P query</a><a href="/p#top">P frag</a>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/p"))
            .respond_with(html_page(r#"<a href="/">Home</a>"#))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/p/"))
            .respond_with(html_page("slash"))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = fast_crawler().crawl(&server.uri()).await.unwrap();
        assert_eq!(outcome.visited.len(), outcome.pages.len());
        assert_eq!(outcome.visited.len(), 2);
    }

    #[tokio::test]
    async fn test_max_pages_limits_crawl() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<a href="/one">1</a><a href="/two">2</a><a href="/three">3</a>"#,
        )
        .await;
        for route in ["/one", "/two", "/three"] {
            mount_page(&server, route, "leaf").await;
        }

        let outcome = fast_crawler()
            .with_max_pages(Some(2))
            .crawl(&server.uri())
            .await
            .unwrap();
        assert_eq!(outcome.visited.len(), 2);
    }

    #[tokio::test]
    async fn test_progress_callback_sees_each_fetch() {
        let server = MockServer::start().await;
        mount_page(&server, "/", r#"<a href="/next">Next</a>"#).await;
        mount_page(&server, "/next", "leaf").await;

        let seen: Arc<Mutex<Vec<(usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let crawler = fast_crawler().with_progress_callback(Arc::new(move |count: usize, url: String| {
            seen_clone.lock().unwrap().push((count, url));
        }));

        crawler.crawl(&server.uri()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 1);
        assert_eq!(seen[1], (2, format!("{}/next", server.uri())));
    }

    #[tokio::test]
    async fn test_crawler_state_is_fresh_per_run() {
        let server = MockServer::start().await;
        mount_page(&server, "/", "root").await;

        let crawler = fast_crawler();
        let first = crawler.crawl(&server.uri()).await.unwrap();
        let second = crawler.crawl(&server.uri()).await.unwrap();
        assert_eq!(first.visited, second.visited);
        assert_eq!(second.pages.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_rejected() {
        let result = fast_crawler().crawl("example.com").await;
        assert!(result.is_err());
    }
}
