//! Cache-first retrieval of historical rate tables.

use super::cache::{RateCache, RateStore};
use super::currency::{RateProvider, RateTable};
use super::error::{RatesError, Result};
use crate::store::debounce::DebouncedWriter;
use chrono::NaiveDate;
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Upper bound on a single provider request.
    pub request_timeout: Duration,
    /// Window in which consecutive cache writes are merged.
    pub save_debounce: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            save_debounce: Duration::from_millis(500),
        }
    }
}

/// Serves rate tables from the persisted cache and fetches only the dates
/// it does not know yet.
///
/// A batch either succeeds completely or leaves the cache untouched. Fetched
/// tables are merged only after every request of the batch has resolved and
/// the merged cache has been flushed to the store, so a batch whose persist
/// failed is fetched and written again on the next call.
pub struct RateFetcher<P: RateProvider, S: RateStore + 'static> {
    provider: P,
    writer: DebouncedWriter<S>,
    cache: Mutex<RateCache>,
    request_timeout: Duration,
}

impl<P: RateProvider, S: RateStore + 'static> RateFetcher<P, S> {
    /// Creates a fetcher primed with whatever `store` currently holds.
    pub async fn load(provider: P, store: S, options: FetchOptions) -> Self {
        let cache = store.read().await;
        info!(entries = cache.len(), "Rate cache loaded");

        Self {
            provider,
            writer: DebouncedWriter::new(store, options.save_debounce),
            cache: Mutex::new(cache),
            request_timeout: options.request_timeout,
        }
    }

    pub fn store(&self) -> &S {
        self.writer.store()
    }

    /// Number of dates currently held in memory.
    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Returns a rate table for every requested date.
    #[instrument(name = "RateFetch", skip_all)]
    pub async fn fetch<I>(&self, dates: I) -> Result<BTreeMap<NaiveDate, RateTable>>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let requested: BTreeSet<NaiveDate> = dates.into_iter().collect();

        let mut rates = BTreeMap::new();
        let mut missing = Vec::new();
        {
            let cache = self.cache.lock().await;
            for date in requested {
                match cache.get(&date) {
                    Some(table) => {
                        rates.insert(date, table.clone());
                    }
                    None => missing.push(date),
                }
            }
        }
        debug!(
            cached = rates.len(),
            missing = missing.len(),
            "Partitioned requested dates"
        );

        if missing.is_empty() {
            return Ok(rates);
        }

        let fetched = try_join_all(missing.iter().map(|date| self.fetch_one(*date))).await?;

        let mut cache = self.cache.lock().await;
        let mut updated = cache.clone();
        for (date, table) in missing.into_iter().zip(fetched) {
            updated.insert(date, table.clone());
            rates.insert(date, table);
        }
        self.writer.schedule(updated.clone()).await;
        self.writer.flush().await?;
        *cache = updated;

        Ok(rates)
    }

    async fn fetch_one(&self, date: NaiveDate) -> Result<RateTable> {
        debug!(%date, "Requesting historical rates");
        match tokio::time::timeout(self.request_timeout, self.provider.historical(date)).await {
            Ok(Ok(table)) => Ok(table),
            Ok(Err(source)) => Err(RatesError::Fetch { date, source }),
            Err(_) => Err(RatesError::Timeout {
                date,
                after: self.request_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Datelike;
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio::sync::Barrier;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn table_for(date: NaiveDate) -> RateTable {
        RateTable::new(
            "USD",
            BTreeMap::from([("ILS".to_string(), 3.0 + f64::from(date.day0()) / 100.0)]),
        )
    }

    #[derive(Clone, Default)]
    struct MockProvider {
        calls: Arc<StdMutex<Vec<NaiveDate>>>,
        failing: Vec<NaiveDate>,
        delay: Option<Duration>,
        barrier: Option<Arc<Barrier>>,
    }

    impl MockProvider {
        fn calls(&self) -> Vec<NaiveDate> {
            let mut calls = self.calls.lock().unwrap().clone();
            calls.sort();
            calls
        }
    }

    #[async_trait]
    impl RateProvider for MockProvider {
        async fn historical(&self, date: NaiveDate) -> anyhow::Result<RateTable> {
            self.calls.lock().unwrap().push(date);
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.contains(&date) {
                return Err(anyhow!("HTTP error: 500 Internal Server Error"));
            }
            Ok(table_for(date))
        }
    }

    async fn fetcher_with(
        provider: MockProvider,
        store: MemoryStore,
    ) -> RateFetcher<MockProvider, MemoryStore> {
        RateFetcher::load(provider, store, FetchOptions::default()).await
    }

    #[tokio::test]
    async fn test_second_fetch_is_a_full_cache_hit() {
        let provider = MockProvider::default();
        let store = MemoryStore::new();
        let fetcher = fetcher_with(provider.clone(), store.clone()).await;

        let first = fetcher.fetch([day(1), day(2)]).await.unwrap();
        assert_eq!(provider.calls().len(), 2);

        let second = fetcher.fetch([day(1), day(2)]).await.unwrap();
        assert_eq!(provider.calls().len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_duplicate_dates_fetched_once() {
        let provider = MockProvider::default();
        let fetcher = fetcher_with(provider.clone(), MemoryStore::new()).await;

        let rates = fetcher.fetch([day(1), day(1), day(2)]).await.unwrap();

        assert_eq!(provider.calls(), vec![day(1), day(2)]);
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[&day(1)], table_for(day(1)));
    }

    #[tokio::test]
    async fn test_only_missing_dates_are_fetched() {
        let mut persisted = RateCache::new();
        persisted.insert(day(1), table_for(day(1)));
        let provider = MockProvider::default();
        let fetcher = fetcher_with(provider.clone(), MemoryStore::with_cache(persisted)).await;

        let rates = fetcher.fetch([day(1), day(2)]).await.unwrap();

        assert_eq!(provider.calls(), vec![day(2)]);
        assert_eq!(rates.keys().copied().collect::<Vec<_>>(), vec![day(1), day(2)]);
    }

    #[tokio::test]
    async fn test_batch_is_persisted_with_a_single_write() {
        let store = MemoryStore::new();
        let fetcher = fetcher_with(MockProvider::default(), store.clone()).await;

        fetcher.fetch([day(1), day(2), day(3)]).await.unwrap();

        assert_eq!(store.write_count(), 1);
        assert_eq!(store.snapshot().await.len(), 3);

        // A full cache hit does not touch the store
        fetcher.fetch([day(2)]).await.unwrap();
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_date_aborts_whole_batch() {
        let provider = MockProvider {
            failing: vec![day(2)],
            ..Default::default()
        };
        let store = MemoryStore::new();
        let fetcher = fetcher_with(provider.clone(), store.clone()).await;

        let err = fetcher.fetch([day(1), day(2)]).await.unwrap_err();

        assert!(matches!(err, RatesError::Fetch { .. }));
        assert_eq!(err.date(), Some(day(2)));
        assert_eq!(store.write_count(), 0);
        assert!(store.snapshot().await.is_empty());
        assert_eq!(fetcher.cached_len().await, 0);
    }

    #[tokio::test]
    async fn test_requests_for_a_batch_run_concurrently() {
        // Each request waits until all three are in flight.
        let provider = MockProvider {
            barrier: Some(Arc::new(Barrier::new(3))),
            ..Default::default()
        };
        let fetcher = fetcher_with(provider.clone(), MemoryStore::new()).await;

        let rates = tokio::time::timeout(
            Duration::from_secs(5),
            fetcher.fetch([day(1), day(2), day(3)]),
        )
        .await
        .expect("requests were not launched together")
        .unwrap();

        assert_eq!(rates.len(), 3);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let provider = MockProvider {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        };
        let options = FetchOptions {
            request_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let store = MemoryStore::new();
        let fetcher = RateFetcher::load(provider, store.clone(), options).await;

        let err = fetcher.fetch([day(4)]).await.unwrap_err();

        assert!(matches!(err, RatesError::Timeout { .. }));
        assert_eq!(err.date(), Some(day(4)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_fatal() {
        struct ReadOnlyStore;

        #[async_trait]
        impl RateStore for ReadOnlyStore {
            async fn read(&self) -> RateCache {
                RateCache::new()
            }

            async fn write(&self, _cache: &RateCache) -> Result<()> {
                Err(RatesError::CacheWrite {
                    path: "rates.json".into(),
                    source: std::io::Error::other("read-only file system"),
                })
            }
        }

        let fetcher =
            RateFetcher::load(MockProvider::default(), ReadOnlyStore, FetchOptions::default())
                .await;

        let err = fetcher.fetch([day(1)]).await.unwrap_err();
        assert!(matches!(err, RatesError::CacheWrite { .. }));
    }

    #[tokio::test]
    async fn test_failed_persist_is_retried_by_next_fetch() {
        #[derive(Clone, Default)]
        struct FirstWriteFails {
            inner: MemoryStore,
            attempts: Arc<StdMutex<usize>>,
        }

        #[async_trait]
        impl RateStore for FirstWriteFails {
            async fn read(&self) -> RateCache {
                self.inner.read().await
            }

            async fn write(&self, cache: &RateCache) -> Result<()> {
                let attempt = {
                    let mut attempts = self.attempts.lock().unwrap();
                    *attempts += 1;
                    *attempts
                };
                if attempt == 1 {
                    return Err(RatesError::CacheWrite {
                        path: "rates.json".into(),
                        source: std::io::Error::other("disk full"),
                    });
                }
                self.inner.write(cache).await
            }
        }

        let provider = MockProvider::default();
        let store = FirstWriteFails::default();
        let fetcher =
            RateFetcher::load(provider.clone(), store.clone(), FetchOptions::default()).await;

        let err = fetcher.fetch([day(1)]).await.unwrap_err();
        assert!(matches!(err, RatesError::CacheWrite { .. }));
        assert_eq!(fetcher.cached_len().await, 0);

        let rates = fetcher.fetch([day(1)]).await.unwrap();

        assert_eq!(rates[&day(1)], table_for(day(1)));
        assert_eq!(*store.attempts.lock().unwrap(), 2);
        assert_eq!(store.inner.snapshot().await.len(), 1);
        assert_eq!(provider.calls(), vec![day(1), day(1)]);
    }
}
