use std::{sync::Arc, time::Duration};

use domain::{CaptionAsset, SubtitleLink};
use log::debug;
use moka::{future::Cache, policy::EvictionPolicy};
use url::Url;

use crate::archive::Wanted;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    PageLinks,
    Caption,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    stage: Stage,
    key: Box<str>,
}

impl CacheKey {
    pub fn page_links(page: &Url) -> Self {
        Self {
            stage: Stage::PageLinks,
            key: page.as_str().into(),
        }
    }

    /// The same url can serve different tracks out of a season pack
    pub fn caption(source: &Url, wanted: &Wanted) -> Self {
        Self {
            stage: Stage::Caption,
            key: format!("{source}|{}", wanted.cache_key()).into(),
        }
    }
}

#[derive(Debug, Clone)]
enum CacheValue {
    PageLinks(Arc<[SubtitleLink]>),
    Caption(CaptionAsset),
}

/// Bounded, expiring memo of page extraction and caption conversion results.
/// Failures are never stored. Concurrent misses on one key both compute.
#[derive(Clone)]
pub struct ResolutionCache {
    entries: Cache<CacheKey, CacheValue>,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY, Self::DEFAULT_TTL)
    }
}

impl ResolutionCache {
    pub const DEFAULT_CAPACITY: u64 = 200;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    /// Empty link lists are returned but not stored
    pub async fn page_links<F, Fut>(&self, page: &Url, compute: F) -> Arc<[SubtitleLink]>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<SubtitleLink>>,
    {
        let key = CacheKey::page_links(page);
        if let Some(CacheValue::PageLinks(links)) = self.entries.get(&key).await {
            debug!("[Cache] Page links hit for {page}");
            return links;
        }

        let links: Arc<[SubtitleLink]> = compute().await.into();
        if !links.is_empty() {
            self.entries
                .insert(key, CacheValue::PageLinks(links.clone()))
                .await;
        }
        links
    }

    pub async fn caption<F, Fut, E>(
        &self,
        source: &Url,
        wanted: &Wanted,
        compute: F,
    ) -> Result<CaptionAsset, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CaptionAsset, E>>,
    {
        let key = CacheKey::caption(source, wanted);
        if let Some(CacheValue::Caption(asset)) = self.entries.get(&key).await {
            debug!("[Cache] Caption hit for {source}");
            return Ok(asset);
        }

        let asset = compute().await?;
        self.entries
            .insert(key, CacheValue::Caption(asset.clone()))
            .await;
        Ok(asset)
    }

    /// Entry count after pending evictions have run
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}
