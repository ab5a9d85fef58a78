//! chromiumoxide backend for Chrome/Chromium over the DevTools protocol.
//!
//! A session is either a freshly launched local browser or a connection to a
//! remote DevTools endpoint. Local browsers are shut down on close; remote
//! ones only lose the pages this session opened. A session dropped without
//! closing stops its handler task, and chromiumoxide kills a launched child
//! process when its `Browser` is dropped.

use std::path::PathBuf;

use bytes::Bytes;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, EventLifecycleEvent, NavigateParams};
use chromiumoxide::page::ScreenshotParams;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use url::Url;

use super::{BrowserLauncher, BrowserPage, BrowserSession, CaptureError, LoadState, Viewport};

/// Where browser sessions come from.
#[derive(Debug, Clone)]
pub enum BrowserEndpoint {
    /// Launch a local headless browser per capture.
    Launch { executable: Option<PathBuf>, no_sandbox: bool },

    /// Connect to a running browser's DevTools endpoint per capture.
    ///
    /// Either a `ws(s)://` debugger URL or an `http(s)://host:port` base that
    /// is resolved through `/json/version`.
    Connect(String),
}

impl BrowserEndpoint {
    /// Pick the endpoint from application config. A remote URL wins.
    pub fn from_config(config: &ogshot_core::AppConfig) -> Self {
        match &config.browser_ws_url {
            Some(url) => BrowserEndpoint::Connect(url.clone()),
            None => BrowserEndpoint::Launch { executable: config.chrome_executable.clone(), no_sandbox: config.no_sandbox },
        }
    }
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Launcher backed by chromiumoxide.
pub struct ChromiumLauncher {
    endpoint: BrowserEndpoint,
    viewport: Viewport,
    http: reqwest::Client,
}

impl ChromiumLauncher {
    pub fn new(endpoint: BrowserEndpoint, viewport: Viewport) -> Self {
        Self { endpoint, viewport, http: reqwest::Client::new() }
    }

    pub fn endpoint(&self) -> &BrowserEndpoint {
        &self.endpoint
    }

    fn adopt(&self, browser: Browser, mut handler: chromiumoxide::Handler, remote: bool) -> ChromiumSession {
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });
        ChromiumSession { browser, handler_task, pages: Vec::new(), remote }
    }
}

/// Resolve a DevTools endpoint to its WebSocket debugger URL.
async fn resolve_ws_url(http: &reqwest::Client, endpoint: &str) -> Result<String, CaptureError> {
    let parsed = Url::parse(endpoint).map_err(|e| CaptureError::BrowserLaunchFailed(e.to_string()))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(endpoint.to_string()),
        "http" | "https" => {
            let version_url = version_url(&parsed)?;
            let info: VersionInfo = http
                .get(version_url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| CaptureError::BrowserLaunchFailed(format!("devtools discovery failed: {e}")))?
                .json()
                .await
                .map_err(|e| CaptureError::BrowserLaunchFailed(format!("bad /json/version response: {e}")))?;
            Ok(info.web_socket_debugger_url)
        }
        scheme => Err(CaptureError::BrowserLaunchFailed(format!("unsupported endpoint scheme: {scheme}"))),
    }
}

fn version_url(base: &Url) -> Result<Url, CaptureError> {
    base.join("/json/version")
        .map_err(|e| CaptureError::BrowserLaunchFailed(e.to_string()))
}

#[async_trait::async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, CaptureError> {
        let session = match &self.endpoint {
            BrowserEndpoint::Launch { executable, no_sandbox } => {
                let mut builder = BrowserConfig::builder().window_size(self.viewport.width, self.viewport.height);
                if let Some(path) = executable {
                    builder = builder.chrome_executable(path);
                }
                if *no_sandbox {
                    builder = builder.no_sandbox();
                }
                let config = builder.build().map_err(CaptureError::BrowserLaunchFailed)?;
                let (browser, handler) = Browser::launch(config)
                    .await
                    .map_err(|e| CaptureError::BrowserLaunchFailed(e.to_string()))?;
                tracing::debug!("launched local browser");
                self.adopt(browser, handler, false)
            }
            BrowserEndpoint::Connect(endpoint) => {
                let ws_url = resolve_ws_url(&self.http, endpoint).await?;
                let (browser, handler) = Browser::connect(ws_url)
                    .await
                    .map_err(|e| CaptureError::BrowserLaunchFailed(e.to_string()))?;
                tracing::debug!(endpoint = endpoint.as_str(), "connected to remote browser");
                self.adopt(browser, handler, true)
            }
        };
        Ok(Box::new(session))
    }
}

/// One chromiumoxide browser plus the task driving its event handler.
pub struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    pages: Vec<Page>,
    remote: bool,
}

#[async_trait::async_trait]
impl BrowserSession for ChromiumSession {
    async fn open_page(&mut self) -> Result<Box<dyn BrowserPage>, CaptureError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("could not open page: {e}")))?;
        self.pages.push(page.clone());
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        for page in self.pages.drain(..) {
            if let Err(e) = page.close().await {
                tracing::debug!("page close failed: {e}");
            }
        }

        let result = if self.remote {
            Ok(())
        } else {
            let closed = self
                .browser
                .close()
                .await
                .map(|_| ())
                .map_err(|e| CaptureError::BrowserLaunchFailed(format!("browser close failed: {e}")));
            if let Err(e) = self.browser.wait().await {
                tracing::debug!("waiting for browser exit failed: {e}");
            }
            closed
        };

        self.handler_task.abort();
        result
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// A chromiumoxide tab.
pub struct ChromiumPage {
    page: Page,
}

#[async_trait::async_trait]
impl BrowserPage for ChromiumPage {
    async fn set_viewport(&self, viewport: &Viewport) -> Result<(), CaptureError> {
        let params =
            SetDeviceMetricsOverrideParams::new(i64::from(viewport.width), i64::from(viewport.height), viewport.scale, false);
        self.page
            .execute(params)
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("could not set viewport: {e}")))?;
        Ok(())
    }

    async fn navigate(&self, url: &Url, until: LoadState) -> Result<(), CaptureError> {
        let wanted = match until {
            LoadState::Loaded => "load",
            LoadState::NetworkIdle => "networkIdle",
        };

        let mut events = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| CaptureError::NavigationFailed(e.to_string()))?;

        let navigated = self
            .page
            .execute(NavigateParams::new(url.as_str()))
            .await
            .map_err(|e| CaptureError::NavigationFailed(e.to_string()))?;

        if let Some(error_text) = navigated.result.error_text.as_deref() {
            return Err(CaptureError::NavigationFailed(format!("{url}: {error_text}")));
        }
        let loader = navigated.result.loader_id.clone();

        while let Some(event) = events.next().await {
            let same_load = loader.as_ref().is_none_or(|id| *id == event.loader_id);
            if same_load && event.name == wanted {
                return Ok(());
            }
        }

        Err(CaptureError::NavigationFailed(format!("{url}: page closed before {wanted}")))
    }

    async fn screenshot_png(&self) -> Result<Bytes, CaptureError> {
        let png = self
            .page
            .screenshot(ScreenshotParams::builder().format(CaptureScreenshotFormat::Png).build())
            .await
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
        Ok(Bytes::from(png))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_config() {
        let config = ogshot_core::AppConfig {
            chrome_executable: Some(PathBuf::from("/usr/bin/chromium")),
            no_sandbox: true,
            ..Default::default()
        };
        assert!(matches!(
            BrowserEndpoint::from_config(&config),
            BrowserEndpoint::Launch { executable: Some(_), no_sandbox: true }
        ));

        let config = ogshot_core::AppConfig {
            browser_ws_url: Some("http://chrome:9222".into()),
            chrome_executable: Some(PathBuf::from("/usr/bin/chromium")),
            ..Default::default()
        };
        assert!(matches!(BrowserEndpoint::from_config(&config), BrowserEndpoint::Connect(url) if url == "http://chrome:9222"));
    }

    #[test]
    fn test_version_url() {
        let base = Url::parse("http://chrome:9222").unwrap();
        assert_eq!(version_url(&base).unwrap().as_str(), "http://chrome:9222/json/version");

        let base = Url::parse("http://chrome:9222/some/path").unwrap();
        assert_eq!(version_url(&base).unwrap().as_str(), "http://chrome:9222/json/version");
    }

    #[tokio::test]
    async fn test_resolve_ws_url_passthrough() {
        let http = reqwest::Client::new();
        let ws = "ws://chrome:9222/devtools/browser/abc";
        assert_eq!(resolve_ws_url(&http, ws).await.unwrap(), ws);
    }

    #[tokio::test]
    async fn test_resolve_ws_url_rejects_scheme() {
        let http = reqwest::Client::new();
        let result = resolve_ws_url(&http, "ftp://chrome:9222").await;
        assert!(matches!(result, Err(CaptureError::BrowserLaunchFailed(_))));
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_local_launch_and_close() {
        let launcher = ChromiumLauncher::new(
            BrowserEndpoint::Launch { executable: None, no_sandbox: true },
            Viewport::OPEN_GRAPH,
        );
        let mut session = launcher.launch().await.unwrap();
        let page = session.open_page().await.unwrap();
        page.set_viewport(&Viewport::OPEN_GRAPH).await.unwrap();
        session.close().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires network and Chrome/Chromium"]
    async fn test_capture_example_page() {
        use crate::render::{CaptureOptions, Renderer, ScreenshotRenderer};

        let launcher = ChromiumLauncher::new(
            BrowserEndpoint::Launch { executable: None, no_sandbox: true },
            Viewport::OPEN_GRAPH,
        );
        let renderer = ScreenshotRenderer::new(launcher, CaptureOptions::default());
        let url = Url::parse("https://example.com").unwrap();

        let png = renderer.capture(&url, &Viewport::OPEN_GRAPH).await.unwrap();
        assert!(png.starts_with(b"\x89PNG"));
    }
}
