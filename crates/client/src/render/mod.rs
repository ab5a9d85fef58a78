//! Headless browser screenshots of Open Graph template pages.
//!
//! The capture algorithm is written against three small traits so that the
//! browser backend can be swapped (and faked in tests):
//!
//! - [`BrowserLauncher`] hands out a fresh [`BrowserSession`] per capture
//! - a session opens [`BrowserPage`]s and must be closed afterwards
//! - a page sets its viewport, navigates, and takes a PNG screenshot
//!
//! [`ScreenshotRenderer`] owns the sequencing: it launches a session, runs the
//! page steps under a navigation timeout, and closes the session on every exit
//! path. The chromiumoxide backend lives in [`chromium`].

#[cfg(feature = "render")]
pub mod chromium;

use std::time::{Duration, Instant};

use bytes::Bytes;
use ogshot_core::WaitStrategy;
use thiserror::Error;
use url::Url;

/// Errors that can occur while capturing a page.
///
/// Clonable so that one failed capture can be reported to every request
/// that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// Failed to launch or connect to a browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    /// The target could not be loaded.
    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    /// The page was not ready within the navigation timeout.
    #[error("navigation timeout after {0}ms")]
    NavigationTimeout(u64),

    /// Page setup or the screenshot itself failed.
    #[error("capture failed: {0}")]
    CaptureFailed(String),
}

/// Viewport used for a capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    /// Device scale factor.
    pub scale: f64,
}

impl Viewport {
    /// Social preview card size.
    pub const OPEN_GRAPH: Viewport = Viewport { width: 1200, height: 630, scale: 1.5 };
}

impl Default for Viewport {
    fn default() -> Self {
        Self::OPEN_GRAPH
    }
}

/// Lifecycle point a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// The `load` event fired.
    Loaded,
    /// The network has gone quiet after loading.
    NetworkIdle,
}

/// Options controlling when a page is considered ready.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// How readiness is decided (default: network idle).
    pub wait: WaitStrategy,

    /// Sleep after load under [`WaitStrategy::FixedDelay`] (default: 1s).
    pub fixed_delay: Duration,

    /// Bound on navigation plus the ready wait (default: 20s).
    pub navigation_timeout: Duration,

    /// Bound on closing the session (default: 5s). A session that misses it
    /// is dropped instead, which kills a locally launched browser.
    pub close_timeout: Duration,
}

/// Default bound on closing a browser session.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            wait: WaitStrategy::NetworkIdle,
            fixed_delay: Duration::from_millis(1000),
            navigation_timeout: Duration::from_millis(20_000),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl CaptureOptions {
    /// Build options from application config.
    pub fn from_config(config: &ogshot_core::AppConfig) -> Self {
        Self {
            wait: config.wait_strategy,
            fixed_delay: config.fixed_delay(),
            navigation_timeout: config.navigation_timeout(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

/// Source of browser sessions.
#[async_trait::async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Start (or connect to) a browser owned by the caller.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, CaptureError>;
}

/// A browser owned by a single capture.
#[async_trait::async_trait]
pub trait BrowserSession: Send {
    /// Open a new blank page.
    async fn open_page(&mut self) -> Result<Box<dyn BrowserPage>, CaptureError>;

    /// Release the browser. Called exactly once, after the last page use.
    async fn close(&mut self) -> Result<(), CaptureError>;
}

/// One tab within a session.
#[async_trait::async_trait]
pub trait BrowserPage: Send + Sync {
    async fn set_viewport(&self, viewport: &Viewport) -> Result<(), CaptureError>;

    /// Navigate to `url` and return once `until` is reached.
    async fn navigate(&self, url: &Url, until: LoadState) -> Result<(), CaptureError>;

    /// Capture the viewport as PNG.
    async fn screenshot_png(&self) -> Result<Bytes, CaptureError>;
}

/// Renderer trait for page screenshots.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Capture `url` at `viewport` as PNG bytes.
    async fn capture(&self, url: &Url, viewport: &Viewport) -> Result<Bytes, CaptureError>;
}

/// Renderer that runs each capture in its own browser session.
pub struct ScreenshotRenderer<L> {
    launcher: L,
    options: CaptureOptions,
}

impl<L: BrowserLauncher> ScreenshotRenderer<L> {
    pub fn new(launcher: L, options: CaptureOptions) -> Self {
        Self { launcher, options }
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    async fn capture_in(
        &self, session: &mut dyn BrowserSession, url: &Url, viewport: &Viewport,
    ) -> Result<Bytes, CaptureError> {
        let page = session.open_page().await?;
        page.set_viewport(viewport).await?;

        let timeout = self.options.navigation_timeout;
        tokio::time::timeout(timeout, async {
            match self.options.wait {
                WaitStrategy::NetworkIdle => page.navigate(url, LoadState::NetworkIdle).await,
                WaitStrategy::FixedDelay => {
                    page.navigate(url, LoadState::Loaded).await?;
                    tokio::time::sleep(self.options.fixed_delay).await;
                    Ok(())
                }
            }
        })
        .await
        .map_err(|_| CaptureError::NavigationTimeout(timeout.as_millis() as u64))??;

        page.screenshot_png().await
    }
}

#[async_trait::async_trait]
impl<L: BrowserLauncher> Renderer for ScreenshotRenderer<L> {
    async fn capture(&self, url: &Url, viewport: &Viewport) -> Result<Bytes, CaptureError> {
        let start = Instant::now();
        let mut session = self.launcher.launch().await?;

        let result = self.capture_in(session.as_mut(), url, viewport).await;

        match tokio::time::timeout(self.options.close_timeout, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(url = %url, error = %e, "failed to close browser session"),
            Err(_) => tracing::warn!(
                url = %url,
                timeout_ms = self.options.close_timeout.as_millis() as u64,
                "browser session did not close in time; dropping it"
            ),
        }
        drop(session);

        let bytes = result?;
        tracing::debug!(
            url = %url,
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "captured page"
        );
        Ok(bytes)
    }
}
