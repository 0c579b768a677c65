use crate::core::cache::{RateCache, RateStore};
use crate::core::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory rate store, used for dry runs and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<RateCache>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `cache`.
    pub fn with_cache(cache: RateCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of completed writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> RateCache {
        self.inner.lock().await.clone()
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn read(&self) -> RateCache {
        let cache = self.inner.lock().await;
        debug!(entries = cache.len(), "Memory store READ");
        cache.clone()
    }

    async fn write(&self, cache: &RateCache) -> Result<()> {
        let mut stored = self.inner.lock().await;
        *stored = cache.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(entries = stored.len(), "Memory store WRITE");
        Ok(())
    }
}
