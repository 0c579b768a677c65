//! Rate cache representation and the storage contract behind it.

use super::currency::RateTable;
use super::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Daily rate tables keyed by calendar date. Entries are only ever added.
pub type RateCache = BTreeMap<NaiveDate, RateTable>;

/// Durable storage for the whole rate cache.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Loads the persisted cache. Missing or unreadable data yields an empty
    /// cache instead of an error.
    async fn read(&self) -> RateCache;

    /// Replaces the persisted cache with `cache`. A failed write leaves the
    /// previous contents intact.
    async fn write(&self, cache: &RateCache) -> Result<()>;
}
