//! Key-value store seam for image payloads.

use std::time::Duration;

use bytes::Bytes;

use super::connection::CacheDb;
use super::images::CachedImage;
use crate::Error;

/// Binary key-value store with per-entry expiration.
///
/// Keys are compared as exact strings. A missing or expired key is
/// `Ok(None)`, never an error.
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    /// Look up the entry stored under `key`, with its etag and expiry.
    async fn get(&self, key: &str) -> Result<Option<CachedImage>, Error>;

    /// Write or overwrite `key`, letting the store evict it after `ttl`.
    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), Error>;
}

#[async_trait::async_trait]
impl ImageStore for CacheDb {
    async fn get(&self, key: &str) -> Result<Option<CachedImage>, Error> {
        self.get_image(key).await
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), Error> {
        self.put_image(key, &value, ttl).await
    }
}
