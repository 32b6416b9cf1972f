use crate::merge::merge_responses;
use crate::report::DiscoveryReport;
use apiscout_scanner::error::Result;
use apiscout_scanner::{
    ApiObserver, CrawlConfig, CrawlOutcome, Crawler, NetworkObserver, ObservationMap,
    ObserveProgressCallback, ObserverConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Options for a full crawl → observe → merge run
pub struct DiscoveryOptions {
    pub base_url: String,
    pub crawl: CrawlConfig,
    pub observer: ObserverConfig,
    pub show_progress_bars: bool,
}

impl DiscoveryOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            crawl: CrawlConfig::default(),
            observer: ObserverConfig::default(),
            show_progress_bars: false,
        }
    }
}

/// Callback for reporting phase changes
pub type DiscoveryProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

/// Crawl `base_url`, optionally drawing a spinner with the running count.
pub async fn execute_crawl(
    base_url: &str,
    config: CrawlConfig,
    show_progress_bars: bool,
) -> Result<CrawlOutcome> {
    let progress_bar = show_progress_bars.then(|| Arc::new(spinner("Starting crawl...")));

    let mut crawler = Crawler::with_config(config);
    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        crawler = crawler.with_progress_callback(Arc::new(move |count: usize, url: String| {
            pb_clone.set_message(format!("Crawling... {} URLs processed ({})", count, url));
        }));
    }

    let outcome = crawler.crawl(base_url).await;

    if let Some(ref pb) = progress_bar {
        match outcome {
            Ok(ref outcome) => pb.finish_with_message(format!(
                "Crawled {} URLs in {:.2} seconds",
                outcome.visited_count(),
                outcome.elapsed.as_secs_f64()
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }

    outcome
}

/// Observe `urls` with any [`NetworkObserver`].
pub async fn execute_observe<O: NetworkObserver>(
    observer: &O,
    urls: &[String],
) -> Result<ObservationMap> {
    info!("Extracting API calls from {} pages", urls.len());
    observer.observe(urls).await
}

/// Observe `urls` in headless Chromium, drawing a spinner when asked.
pub async fn execute_browser_observe(
    config: ObserverConfig,
    urls: &[String],
    show_progress_bars: bool,
) -> Result<ObservationMap> {
    let observer = ApiObserver::with_config(config);
    let adapter = ProgressObserver {
        inner: &observer,
        show_progress_bars,
    };
    execute_observe(&adapter, urls).await
}

/// Run the whole pipeline with a real headless browser.
pub async fn execute_discovery(
    options: DiscoveryOptions,
    progress_callback: Option<DiscoveryProgressCallback>,
) -> Result<DiscoveryReport> {
    let observer = ApiObserver::with_config(options.observer.clone());
    let adapter = ProgressObserver {
        inner: &observer,
        show_progress_bars: options.show_progress_bars,
    };

    execute_discovery_with(&adapter, options, progress_callback).await
}

/// Run the whole pipeline with the given observer.
///
/// Data flows one way: the crawl's visited pages are the only input to the
/// observer, and nothing the observer sees is fed back into the crawl.
pub async fn execute_discovery_with<O: NetworkObserver>(
    observer: &O,
    options: DiscoveryOptions,
    progress_callback: Option<DiscoveryProgressCallback>,
) -> Result<DiscoveryReport> {
    let DiscoveryOptions {
        base_url,
        crawl,
        observer: _,
        show_progress_bars,
    } = options;

    if let Some(ref callback) = progress_callback {
        callback(format!("Starting crawl of {}", base_url));
    }
    let outcome = execute_crawl(&base_url, crawl, show_progress_bars).await?;

    if let Some(ref callback) = progress_callback {
        callback(format!(
            "Extracting API calls from {} crawled URLs...",
            outcome.pages.len()
        ));
    }
    let observations = execute_observe(observer, &outcome.pages).await?;
    let endpoints = merge_responses(&observations, &base_url);

    info!(
        "Discovered {} endpoints under {} across {} pages",
        endpoints.len(),
        base_url,
        observations.len()
    );

    Ok(DiscoveryReport::new(base_url, &outcome, observations, endpoints))
}

/// Adapter that draws a spinner while [`ApiObserver`] walks the pages.
struct ProgressObserver<'a> {
    inner: &'a ApiObserver,
    show_progress_bars: bool,
}

impl NetworkObserver for ProgressObserver<'_> {
    async fn observe(&self, urls: &[String]) -> Result<ObservationMap> {
        if !self.show_progress_bars {
            return self.inner.observe(urls).await;
        }

        let pb = Arc::new(spinner("Launching browser..."));
        let pb_clone = pb.clone();
        let callback: ObserveProgressCallback =
            Arc::new(move |position: usize, total: usize, url: String| {
                pb_clone.set_message(format!("Observing {}/{}: {}", position, total, url));
            });

        let result = self.inner.observe_with_progress(urls, Some(callback)).await;
        match result {
            Ok(ref observations) => pb.finish_with_message(format!(
                "Observed {}/{} pages",
                observations.len(),
                urls.len()
            )),
            Err(_) => pb.finish_and_clear(),
        }
        result
    }
}
