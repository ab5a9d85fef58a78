//! Test doubles for the store and renderer seams.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use ogshot_client::{CaptureError, Renderer, Viewport};
use ogshot_core::config::DEFAULT_CACHE_TTL_SECS;
use ogshot_core::{CachedImage, Error, ImageStore};
use url::Url;

/// Stored `expires_at` value for an entry expiring `ttl` from now.
pub fn expires_in(ttl: Duration) -> String {
    CachedImage::fresh("", Bytes::new(), ttl).unwrap().expires_at
}

/// In-memory store that records every write.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CachedImage>>,
    writes: Mutex<Vec<(String, Bytes, Duration)>>,
    pub fail_gets: AtomicBool,
    pub fail_puts: AtomicBool,
    pub put_attempts: AtomicUsize,
}

impl MemoryStore {
    pub fn seed(&self, key: &str, bytes: &'static [u8]) {
        let ttl = Duration::from_secs(DEFAULT_CACHE_TTL_SECS);
        self.seed_image(CachedImage::fresh(key, Bytes::from_static(bytes), ttl).unwrap());
    }

    pub fn seed_image(&self, image: CachedImage) {
        self.entries.lock().unwrap().insert(image.key.clone(), image);
    }

    pub fn writes(&self) -> Vec<(String, Bytes, Duration)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ImageStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CachedImage>, Error> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(Error::CacheUnavailable("get refused".into()));
        }
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), Error> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::CacheUnavailable("put refused".into()));
        }
        let image = CachedImage::fresh(key, value.clone(), ttl)?;
        self.entries.lock().unwrap().insert(key.to_string(), image);
        self.writes.lock().unwrap().push((key.to_string(), value, ttl));
        Ok(())
    }
}

/// Renderer that returns canned bytes and records what it was asked for.
pub struct FakeRenderer {
    result: Result<Bytes, CaptureError>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<(String, Viewport)>>,
}

impl FakeRenderer {
    pub fn returning(bytes: &'static [u8]) -> Self {
        Self::with_result(Ok(Bytes::from_static(bytes)))
    }

    pub fn failing(err: CaptureError) -> Self {
        Self::with_result(Err(err))
    }

    fn with_result(result: Result<Bytes, CaptureError>) -> Self {
        Self { result, delay: None, calls: AtomicUsize::new(0), requests: Mutex::new(Vec::new()) }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait::async_trait]
impl Renderer for FakeRenderer {
    async fn capture(&self, url: &Url, viewport: &Viewport) -> Result<Bytes, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((url.to_string(), *viewport));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}
