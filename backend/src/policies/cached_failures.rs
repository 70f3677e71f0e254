//! Negative cache of failed remote URLs.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use super::{check_option, PolicyRequest, PreDownloadPolicy};
use crate::error::Result;

pub const YES: &str = "yes";
pub const NO: &str = "no";

const OPTIONS: &[&str] = &[YES, NO];

/// Bounded map of remote URL to the instant it last failed. Entries expire
/// after `ttl`.
pub struct UrlFailureCache {
    entries: Mutex<LruCache<String, Instant>>,
    ttl: Duration,
}

impl UrlFailureCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Instant>> {
        // Entries are plain timestamps; a poisoned lock still holds valid data.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a failure for `url`.
    pub fn cache_failure(&self, url: &str) {
        self.lock().put(url.to_string(), Instant::now());
    }

    /// Whether `url` failed within the cache period. Expired entries are
    /// evicted on lookup.
    pub fn has_failed_before(&self, url: &str) -> bool {
        let mut entries = self.lock();
        match entries.get(url) {
            Some(failed_at) if failed_at.elapsed() < self.ttl => true,
            Some(_) => {
                entries.pop(url);
                false
            }
            None => false,
        }
    }

    /// Forget a failure, e.g. after a later successful transfer.
    pub fn remove(&self, url: &str) {
        self.lock().pop(url);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Blocks a fetch whose URL is in the negative cache when set to `yes`.
pub struct CachedFailuresPolicy {
    cache: Arc<UrlFailureCache>,
}

impl CachedFailuresPolicy {
    pub fn new(cache: Arc<UrlFailureCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl PreDownloadPolicy for CachedFailuresPolicy {
    fn id(&self) -> &'static str {
        "cache-failures"
    }

    fn options(&self) -> &'static [&'static str] {
        OPTIONS
    }

    fn default_option(&self) -> &'static str {
        NO
    }

    async fn apply(&self, setting: &str, request: &PolicyRequest<'_>) -> Result<bool> {
        let setting = check_option(self.id(), OPTIONS, setting)?;
        if setting == NO {
            return Ok(true);
        }
        if self.cache.has_failed_before(request.url) {
            tracing::debug!(url = %request.url, "Skipping URL with a cached failure");
            return Ok(false);
        }
        Ok(true)
    }
}
