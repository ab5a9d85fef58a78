//! Client code for ogshot.
//!
//! This crate provides the screenshot pipeline (browser sessions, page
//! capture, the chromiumoxide backend) and construction of the internal
//! `/og` URLs that get captured.

pub mod render;
pub mod target;

pub use render::{
    BrowserLauncher, BrowserPage, BrowserSession, CaptureError, CaptureOptions, LoadState, Renderer,
    ScreenshotRenderer, Viewport,
};

#[cfg(feature = "render")]
pub use render::chromium::{BrowserEndpoint, ChromiumLauncher};

pub use target::{TargetError, allowed_origin_from_host, host_allowed, og_target, origin_from_host, parse_origin};
