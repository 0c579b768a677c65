use crate::core::cache::{RateCache, RateStore};
use crate::core::error::{RatesError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Rate cache persisted as a single JSON document keyed by ISO date.
///
/// Writes go to a sibling temporary file that is synced to disk and then
/// renamed over the target, so readers only ever see a complete document.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("rates.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn replace(&self, cache: &RateCache) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_vec_pretty(cache)?;
        let temp_path = self.temp_path();
        let replaced = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(&contents).await?;
            file.flush().await?;
            file.sync_all().await?;
            tokio::fs::rename(&temp_path, &self.path).await
        }
        .await;
        if let Err(e) = replaced {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl RateStore for JsonFileStore {
    async fn read(&self) -> RateCache {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No rate cache yet, starting empty");
                return RateCache::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read rate cache, starting empty");
                return RateCache::new();
            }
        };

        match serde_json::from_slice::<RateCache>(&bytes) {
            Ok(cache) => {
                debug!(path = %self.path.display(), entries = cache.len(), "Loaded rate cache");
                cache
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Rate cache is corrupt, starting empty");
                RateCache::new()
            }
        }
    }

    async fn write(&self, cache: &RateCache) -> Result<()> {
        self.replace(cache)
            .await
            .map_err(|source| RatesError::CacheWrite {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), entries = cache.len(), "Saved rate cache");
        Ok(())
    }
}
