//! Content-addressed cache of pipeline runs using moka.
//!
//! Keyed by file hash plus the run options that change the result.
//! Concurrent requests for the same key share one in-flight computation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::models::ExtractionStrategy;
use crate::pipeline::error::PipelineError;
use crate::pipeline::processor::PipelineArtifacts;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        file_hash: &str,
        strategy: Option<ExtractionStrategy>,
        industry: Option<&str>,
        jurisdiction: Option<&str>,
    ) -> Self {
        Self(format!(
            "{file_hash}|{}|{}|{}",
            strategy.map_or("auto", |s| s.as_str()),
            industry.unwrap_or("-").to_lowercase(),
            jurisdiction.unwrap_or("-").to_uppercase(),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone)]
pub struct ArtifactCache {
    inner: Cache<CacheKey, Arc<PipelineArtifacts>>,
}

impl ArtifactCache {
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cached artifacts for `key`, computing them at most once across
    /// concurrent callers. Failures are not cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> Result<Arc<PipelineArtifacts>, Arc<PipelineError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PipelineArtifacts, PipelineError>>,
    {
        self.inner
            .try_get_with(key, async move { compute().await.map(Arc::new) })
            .await
    }

    /// Drop a cached run so the next request for `key` recomputes.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.inner.invalidate(key).await;
    }

    /// Approximate; pending maintenance is not flushed.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
