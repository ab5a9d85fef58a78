//! De-duplication of concurrent captures for the same key.
//!
//! The first miss for a key spawns the work and parks a shared handle to it
//! in the map; later misses for that key await the same handle. The spawned
//! task owns the map entry and clears it when it finishes, whether or not
//! anyone is still waiting, so the next miss after that starts fresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use ogshot_client::CaptureError;
use tokio::task::JoinError;

type SharedCapture = Shared<BoxFuture<'static, Result<Bytes, CaptureError>>>;
type PendingMap = Arc<Mutex<HashMap<String, SharedCapture>>>;

/// Map from cache key to the capture currently producing it.
#[derive(Clone, Default)]
pub struct InFlight {
    pending: PendingMap,
}

/// Removes its key from the map when the owning task ends, panics included.
struct PendingEntry {
    map: PendingMap,
    key: String,
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        self.map.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}

/// Error reported when a capture task panicked or was cancelled.
pub fn task_failed(e: JoinError) -> CaptureError {
    CaptureError::CaptureFailed(format!("capture task ended abnormally: {e}"))
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the capture for `key`, starting it with `start` if none is running.
    ///
    /// The work runs on its own task, so dropping every caller does not stop
    /// it or leave its entry behind.
    pub async fn run<F>(&self, key: &str, start: F) -> Result<Bytes, CaptureError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Bytes, CaptureError>>,
    {
        let shared = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match pending.get(key) {
                Some(existing) => {
                    tracing::debug!(key, "joining in-flight capture");
                    existing.clone()
                }
                None => {
                    let entry = PendingEntry { map: Arc::clone(&self.pending), key: key.to_string() };
                    let work = start();
                    // The task cannot clear the entry before it is inserted: it
                    // needs this lock, which is held until the insert below.
                    let task = tokio::spawn(async move {
                        let _entry = entry;
                        work.await
                    });
                    let shared = async move { task.await.map_err(task_failed)? }.boxed().shared();
                    pending.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    /// Number of keys with a capture in progress.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
