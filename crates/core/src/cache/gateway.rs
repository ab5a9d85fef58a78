//! Fail-open wrapper around an [`ImageStore`].
//!
//! The request path never fails because of the cache: a lookup error is a
//! miss and a write error is logged and dropped. The image the caller holds
//! is valid whether or not it could be cached.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::images::CachedImage;
use super::store::ImageStore;

/// Cache gateway used by the request path.
#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn ImageStore>,
    reads_enabled: bool,
}

impl CacheGateway {
    /// Wrap a store with reads enabled.
    pub fn new(store: Arc<dyn ImageStore>) -> Self {
        Self { store, reads_enabled: true }
    }

    /// Turn cache reads on or off. Writes happen either way.
    pub fn with_reads_enabled(mut self, enabled: bool) -> Self {
        self.reads_enabled = enabled;
        self
    }

    pub fn reads_enabled(&self) -> bool {
        self.reads_enabled
    }

    /// Look up `key`, treating any store failure as a miss.
    pub async fn get(&self, key: &str) -> Option<CachedImage> {
        if !self.reads_enabled {
            return None;
        }

        match self.store.get(key).await {
            Ok(Some(image)) => {
                tracing::debug!(key, bytes = image.bytes.len(), expires_at = %image.expires_at, "cache hit");
                Some(image)
            }
            Ok(None) => {
                tracing::debug!(key, "cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache lookup failed; treating as miss");
                None
            }
        }
    }

    /// Write `value` under `key` with the given TTL.
    ///
    /// Returns whether the write landed. Failures are logged, not raised.
    pub async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> bool {
        let len = value.len();
        match self.store.put(key, value, ttl).await {
            Ok(()) => {
                tracing::debug!(key, bytes = len, ttl_secs = ttl.as_secs(), "cached image");
                true
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache write failed; serving uncached image");
                false
            }
        }
    }
}

impl std::fmt::Debug for CacheGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheGateway")
            .field("reads_enabled", &self.reads_enabled)
            .finish_non_exhaustive()
    }
}
