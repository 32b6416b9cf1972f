use crate::browser::launch_browser;
use crate::error::{Result, ScanError};
use crate::network::{NetworkEvent, NetworkLog, ObservationMap, PageObservation};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
};
use chromiumoxide::{Browser, Page};
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until, timeout_at};
use tracing::{debug, info, warn};

/// Called with (position, total, url) before each page is loaded.
pub type ObserveProgressCallback = Arc<dyn Fn(usize, usize, String) + Send + Sync>;

pub const DEFAULT_IDLE_WINDOW_MS: u64 = 500;
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ObserverConfig {
    pub headless: bool,
    /// How long the page must stay quiet before it counts as loaded.
    pub idle_window: Duration,
    /// Upper bound for navigation plus the idle wait.
    pub navigation_timeout: Duration,
    pub chrome_path: Option<PathBuf>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            idle_window: Duration::from_millis(DEFAULT_IDLE_WINDOW_MS),
            navigation_timeout: Duration::from_secs(DEFAULT_NAVIGATION_TIMEOUT_SECS),
            chrome_path: None,
        }
    }
}

/// Anything that can turn a list of page URLs into per-page API traffic.
pub trait NetworkObserver: Send + Sync {
    fn observe(&self, urls: &[String]) -> impl Future<Output = Result<ObservationMap>> + Send;
}

/// Loads pages in headless Chromium and records their XHR/fetch traffic.
///
/// One browser serves the whole batch, but every URL gets its own tab that
/// is closed afterwards, so listeners never see another page's traffic.
pub struct ApiObserver {
    config: ObserverConfig,
}

impl ApiObserver {
    pub fn new() -> Self {
        Self::with_config(ObserverConfig::default())
    }

    pub fn with_config(config: ObserverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// Observe `urls` in order. Pages that fail to load are logged and left
    /// out of the result; only a browser launch failure is an error.
    pub async fn observe_with_progress(
        &self,
        urls: &[String],
        progress_callback: Option<ObserveProgressCallback>,
    ) -> Result<ObservationMap> {
        let mut observations = ObservationMap::new();
        if urls.is_empty() {
            return Ok(observations);
        }

        let session = launch_browser(
            self.config.headless,
            self.config.chrome_path.as_deref(),
            self.config.navigation_timeout,
        )
        .await?;

        for (idx, url) in urls.iter().enumerate() {
            if let Some(ref callback) = progress_callback {
                callback(idx + 1, urls.len(), url.clone());
            }

            info!("Visiting: {}", url);
            match self.observe_page(&session.browser, url).await {
                Ok(observation) => {
                    debug!(
                        "{}: {} API requests, {} API responses",
                        url,
                        observation.requests.len(),
                        observation.responses.len()
                    );
                    observations.insert(url.clone(), observation);
                }
                Err(e) => warn!("Error processing {}: {}", url, e),
            }
        }

        session.shutdown().await;
        info!("Observed {}/{} pages", observations.len(), urls.len());
        Ok(observations)
    }

    async fn observe_page(&self, browser: &Browser, url: &str) -> Result<PageObservation> {
        let page = browser.new_page("about:blank").await?;
        let result = self.capture(&page, url).await;
        if let Err(e) = page.close().await {
            debug!("Failed to close tab for {}: {}", url, e);
        }
        result
    }

    async fn capture(&self, page: &Page, url: &str) -> Result<PageObservation> {
        let requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let responses = page.event_listener::<EventResponseReceived>().await?;
        let finished = page.event_listener::<EventLoadingFinished>().await?;
        let failed = page.event_listener::<EventLoadingFailed>().await?;

        let deadline = Instant::now() + self.config.navigation_timeout;

        match timeout_at(deadline, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(ScanError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => return Err(ScanError::Timeout(self.config.navigation_timeout)),
        }

        let events = stream::select_all([
            requests
                .map(|event| NetworkEvent::Request {
                    id: event.request_id.inner().clone(),
                    url: event.request.url.clone(),
                    resource_type: event.r#type.clone(),
                })
                .boxed(),
            responses
                .map(|event| NetworkEvent::Response {
                    url: event.response.url.clone(),
                    resource_type: event.r#type.clone(),
                })
                .boxed(),
            finished
                .map(|event| NetworkEvent::Settled {
                    id: event.request_id.inner().clone(),
                })
                .boxed(),
            failed
                .map(|event| NetworkEvent::Settled {
                    id: event.request_id.inner().clone(),
                })
                .boxed(),
        ]);

        let (log, went_idle) =
            wait_for_network_idle(events, self.config.idle_window, deadline).await;
        if !went_idle {
            warn!(
                "{}: network never went idle, keeping {} events seen so far",
                url,
                log.event_count()
            );
        }

        Ok(log.into_observation())
    }
}

/// Feed `events` into a fresh [`NetworkLog`] until no XHR/fetch has been in
/// flight for `idle_window`, the stream ends, or `deadline` passes.
///
/// Listener streams are buffered, so events fired during navigation are
/// replayed here before the idle timer can win. Returns the log and whether
/// the page went idle before the deadline.
pub(crate) async fn wait_for_network_idle<S>(
    mut events: S,
    idle_window: Duration,
    deadline: Instant,
) -> (NetworkLog, bool)
where
    S: Stream<Item = NetworkEvent> + Unpin,
{
    let mut log = NetworkLog::new();
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => log.record(event),
                None => {
                    debug!("Network event streams closed");
                    let idle = log.is_idle();
                    return (log, idle);
                }
            },
            _ = sleep(idle_window) => {
                if log.is_idle() {
                    return (log, true);
                }
                debug!("{} requests still in flight", log.in_flight());
            }
            _ = sleep_until(deadline) => return (log, false),
        }
    }
}

impl Default for ApiObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkObserver for ApiObserver {
    async fn observe(&self, urls: &[String]) -> Result<ObservationMap> {
        self.observe_with_progress(urls, None).await
    }
}
