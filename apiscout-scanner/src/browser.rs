use crate::error::{Result, ScanError};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

const LINUX_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/usr/local/bin/chromium",
    "/opt/google/chrome/chrome",
];

const MACOS_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/homebrew/bin/chromium",
];

const WINDOWS_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\Chromium\Application\chrome.exe",
];

/// Find a Chrome/Chromium executable.
///
/// `CHROMIUM_PATH` wins over everything, then the usual install locations,
/// then `which` on Unix.
pub fn find_browser_executable() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Some(path);
        }
        warn!(
            "CHROMIUM_PATH points to non-existent file: {}",
            path.display()
        );
    }

    let candidates = if cfg!(target_os = "windows") {
        WINDOWS_PATHS
    } else if cfg!(target_os = "macos") {
        MACOS_PATHS
    } else {
        LINUX_PATHS
    };

    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        info!("Found browser at: {}", path.display());
        return Some(path);
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    info!("Found browser using 'which': {}", found);
                    return Some(PathBuf::from(found));
                }
            }
        }
    }

    None
}

/// Download a managed Chromium build into the temp directory.
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_dir = std::env::temp_dir().join("apiscout_chromium");
    std::fs::create_dir_all(&cache_dir)?;
    info!("Downloading managed Chromium into {}", cache_dir.display());

    let options = BrowserFetcherOptions::builder()
        .with_path(&cache_dir)
        .build()
        .map_err(|e| ScanError::Browser(format!("Failed to build fetcher options: {}", e)))?;

    let revision = BrowserFetcher::new(options)
        .fetch()
        .await
        .map_err(|e| ScanError::Browser(format!("Failed to fetch browser: {}", e)))?;

    info!("Downloaded Chromium to: {}", revision.folder_path.display());
    Ok(revision.executable_path)
}

/// A running browser and the task pumping its CDP connection.
pub struct BrowserSession {
    pub browser: Browser,
    handler_task: JoinHandle<()>,
    profile_dir: TempDir,
}

impl BrowserSession {
    /// Close the browser and wait for the handler task to drain.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Browser process wait failed: {}", e);
        }
        self.handler_task.abort();

        let path = self.profile_dir.path().to_path_buf();
        if let Err(e) = self.profile_dir.close() {
            debug!("Could not remove browser profile {}: {}", path.display(), e);
        }
    }
}

/// A fresh profile directory per launch, so concurrent browsers in one
/// process never share (and lock) the same profile.
pub fn create_profile_dir() -> Result<TempDir> {
    Ok(tempfile::Builder::new()
        .prefix("apiscout_chrome_")
        .tempdir()?)
}

pub async fn launch_browser(
    headless: bool,
    chrome_path: Option<&Path>,
    request_timeout: Duration,
) -> Result<BrowserSession> {
    let chrome_path = match chrome_path {
        Some(path) => path.to_path_buf(),
        None => match find_browser_executable() {
            Some(path) => path,
            None => {
                warn!("No Chrome/Chromium executable found, falling back to download");
                download_managed_browser().await?
            }
        },
    };

    // Dropped (and deleted) on every early return below
    let profile_dir = create_profile_dir()?;

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(request_timeout)
        .window_size(1920, 1080)
        .user_data_dir(profile_dir.path())
        .chrome_executable(chrome_path);

    if headless {
        config_builder = config_builder.headless_mode(HeadlessMode::default());
    } else {
        config_builder = config_builder.with_head();
    }

    let browser_config = config_builder
        .arg("--disable-notifications")
        .arg("--disable-extensions")
        .arg("--disable-popup-blocking")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-setuid-sandbox")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--no-sandbox")
        .arg("--mute-audio")
        .build()
        .map_err(|e| ScanError::Browser(format!("Failed to build browser config: {}", e)))?;

    debug!("Launching browser with config: {:?}", browser_config);
    let (browser, mut handler) = Browser::launch(browser_config).await?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let message = e.to_string();
                // chromiumoxide cannot decode every CDP message newer Chrome sends
                if message.contains("data did not match any variant of untagged enum Message")
                    || message.contains("Failed to deserialize WS response")
                {
                    trace!("Suppressed CDP deserialization error: {}", message);
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        debug!("Browser handler task completed");
    });

    info!("Browser launched");
    Ok(BrowserSession {
        browser,
        handler_task,
        profile_dir,
    })
}
