//! Cache-aside flow for Open Graph images.
//!
//! Lookup by exact target URL; on a miss, capture the page and write the
//! bytes back with the configured TTL. The capture and its cache write run
//! on their own task, so a client that disconnects mid-capture does not
//! leave a browser session half-closed or skip the write.
//!
//! A hit reports the stored etag and the entry's remaining lifetime; a miss
//! reports a fresh etag and the full TTL.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use ogshot_client::{CaptureError, Renderer, Viewport};
use ogshot_core::cache::hash::content_etag;
use ogshot_core::{AppConfig, CacheGateway};
use url::Url;

use crate::inflight::{InFlight, task_failed};

/// Whether a response came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Image bytes plus where they came from.
#[derive(Debug, Clone)]
pub struct ImageOutcome {
    pub bytes: Bytes,
    pub cache: CacheStatus,
    /// Hex SHA-256 of `bytes`, unquoted.
    pub etag: String,
    /// How long downstream caches may keep the image.
    pub max_age: Duration,
}

/// Tunables for [`OgImageService`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub viewport: Viewport,
    pub cache_ttl: Duration,
    pub dedupe_in_flight: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::OPEN_GRAPH,
            cache_ttl: Duration::from_secs(ogshot_core::config::DEFAULT_CACHE_TTL_SECS),
            dedupe_in_flight: true,
        }
    }
}

impl ServiceOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            viewport: Viewport::OPEN_GRAPH,
            cache_ttl: config.cache_ttl(),
            dedupe_in_flight: config.dedupe_in_flight,
        }
    }
}

struct Inner {
    gateway: CacheGateway,
    renderer: Arc<dyn Renderer>,
    options: ServiceOptions,
    inflight: Option<InFlight>,
}

/// Produces the PNG for a target URL, from cache or a fresh capture.
#[derive(Clone)]
pub struct OgImageService {
    inner: Arc<Inner>,
}

impl OgImageService {
    pub fn new(gateway: CacheGateway, renderer: Arc<dyn Renderer>, options: ServiceOptions) -> Self {
        let inflight = options.dedupe_in_flight.then(InFlight::new);
        Self { inner: Arc::new(Inner { gateway, renderer, options, inflight }) }
    }

    /// Image for `target`, keyed by its exact serialization.
    pub async fn image_for(&self, target: &Url) -> Result<ImageOutcome, CaptureError> {
        let key = target.as_str();

        if let Some(image) = self.inner.gateway.get(key).await {
            let max_age = image.remaining_ttl();
            return Ok(ImageOutcome { bytes: image.bytes, cache: CacheStatus::Hit, etag: image.etag, max_age });
        }

        let bytes = match &self.inner.inflight {
            Some(inflight) => inflight.run(key, || self.capture_and_store(target.clone())).await?,
            None => tokio::spawn(self.capture_and_store(target.clone())).await.map_err(task_failed)??,
        };

        Ok(ImageOutcome {
            etag: content_etag(&bytes),
            bytes,
            cache: CacheStatus::Miss,
            max_age: self.inner.options.cache_ttl,
        })
    }

    /// Capture `target` and write it back. Callers run this on its own task.
    fn capture_and_store(&self, target: Url) -> BoxFuture<'static, Result<Bytes, CaptureError>> {
        let inner = Arc::clone(&self.inner);
        async move {
            let bytes = inner.renderer.capture(&target, &inner.options.viewport).await?;
            inner
                .gateway
                .put(target.as_str(), bytes.clone(), inner.options.cache_ttl)
                .await;
            Ok(bytes)
        }
        .boxed()
    }
}
