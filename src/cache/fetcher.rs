//! Caching decorator around the remote screen source.

use std::sync::Arc;

use async_trait::async_trait;

use super::memory::MemoryScreenCache;
use super::policy::{CachePolicy, CachePolicyResolver, ConfiguredPolicyResolver};
use super::{CacheError, CachedScreenEntry, ScreenCache};
use crate::clock::{Clock, SystemClock};
use crate::error::{FetchError, RuntimeError};
use crate::screen::{validate, Screen, ScreenRequest, ValidationLimits};

/// Remote source of screen payloads.
#[async_trait]
pub trait ScreenFetcher: Send + Sync {
    async fn fetch(&self, request: &ScreenRequest) -> Result<Screen, FetchError>;
}

pub struct CachingScreenFetcherBuilder {
    fetcher: Arc<dyn ScreenFetcher>,
    memory: Option<Arc<dyn ScreenCache>>,
    disk: Option<Arc<dyn ScreenCache>>,
    resolver: Option<Arc<dyn CachePolicyResolver>>,
    limits: ValidationLimits,
    clock: Arc<dyn Clock>,
}

impl CachingScreenFetcherBuilder {
    /// Memory tier (default: a [`MemoryScreenCache`] on the builder's clock).
    pub fn memory_cache(mut self, cache: Arc<dyn ScreenCache>) -> Self {
        self.memory = Some(cache);
        self
    }

    /// Disk tier. Without one, `Disk` policies behave like `Memory`.
    pub fn disk_cache(mut self, cache: Arc<dyn ScreenCache>) -> Self {
        self.disk = Some(cache);
        self
    }

    pub fn policy_resolver(mut self, resolver: Arc<dyn CachePolicyResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> CachingScreenFetcher {
        let clock = self.clock;
        CachingScreenFetcher {
            fetcher: self.fetcher,
            memory: self
                .memory
                .unwrap_or_else(|| Arc::new(MemoryScreenCache::with_clock(Arc::clone(&clock)))),
            disk: self.disk,
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(ConfiguredPolicyResolver::default())),
            limits: self.limits,
            clock,
        }
    }
}

/// Loads screens through the cache tiers, validating everything fetched.
///
/// Only screens that pass validation are ever cached. Cache failures are
/// logged and degrade to a miss; they never fail a load.
pub struct CachingScreenFetcher {
    fetcher: Arc<dyn ScreenFetcher>,
    memory: Arc<dyn ScreenCache>,
    disk: Option<Arc<dyn ScreenCache>>,
    resolver: Arc<dyn CachePolicyResolver>,
    limits: ValidationLimits,
    clock: Arc<dyn Clock>,
}

impl CachingScreenFetcher {
    pub fn builder(fetcher: Arc<dyn ScreenFetcher>) -> CachingScreenFetcherBuilder {
        CachingScreenFetcherBuilder {
            fetcher,
            memory: None,
            disk: None,
            resolver: None,
            limits: ValidationLimits::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    pub async fn load(&self, request: &ScreenRequest) -> Result<Screen, RuntimeError> {
        let key = request.cache_key();
        let policy = self.resolver.resolve(request);
        let disk = match policy {
            CachePolicy::Disk { .. } => self.disk.as_ref(),
            _ => None,
        };

        if policy != CachePolicy::Disabled {
            if let Some(entry) = read_tier(self.memory.as_ref(), &key, "memory").await {
                tracing::debug!(key = %key, "Screen served from memory cache");
                return Ok(entry.screen);
            }
            if let Some(disk) = disk {
                if let Some(entry) = read_tier(disk.as_ref(), &key, "disk").await {
                    tracing::debug!(key = %key, "Screen served from disk cache");
                    let screen = entry.screen.clone();
                    write_tier(self.memory.as_ref(), &key, entry, "memory").await;
                    return Ok(screen);
                }
            }
        }

        let screen = self.fetcher.fetch(request).await.map_err(|e| {
            tracing::warn!(key = %key, error = %e, "Screen fetch failed");
            RuntimeError::from(e)
        })?;

        let issues = validate(&screen, &self.limits);
        if !issues.is_empty() {
            tracing::warn!(
                key = %key,
                issues = issues.len(),
                first = %issues[0],
                "Rejected invalid screen"
            );
            return Err(RuntimeError::Validation(issues));
        }

        if policy != CachePolicy::Disabled {
            let expires_at = policy.ttl().map(|ttl| self.clock.now() + ttl);
            let entry = CachedScreenEntry::new(screen.clone(), expires_at);
            if let Some(disk) = disk {
                write_tier(disk.as_ref(), &key, entry.clone(), "disk").await;
            } else if matches!(policy, CachePolicy::Disk { .. }) {
                tracing::debug!(key = %key, "No disk cache configured, caching in memory only");
            }
            write_tier(self.memory.as_ref(), &key, entry, "memory").await;
        }

        tracing::debug!(key = %key, version = screen.version, "Screen fetched");
        Ok(screen)
    }

    /// Drop any cached copy of `request` from every tier.
    pub async fn invalidate(&self, request: &ScreenRequest) -> Result<(), CacheError> {
        let key = request.cache_key();
        self.memory.remove(&key).await?;
        if let Some(disk) = &self.disk {
            disk.remove(&key).await?;
        }
        Ok(())
    }

    /// Sweep expired entries from every tier. Returns the number removed.
    pub async fn clear_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let mut removed = self.memory.clear_expired(now).await?;
        if let Some(disk) = &self.disk {
            removed += disk.clear_expired(now).await?;
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for CachingScreenFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingScreenFetcher")
            .field("disk", &self.disk.is_some())
            .field("limits", &self.limits)
            .finish()
    }
}

async fn read_tier(cache: &dyn ScreenCache, key: &str, tier: &str) -> Option<CachedScreenEntry> {
    match cache.get(key).await {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!(key = %key, tier, error = %e, "Screen cache read failed");
            None
        }
    }
}

async fn write_tier(cache: &dyn ScreenCache, key: &str, entry: CachedScreenEntry, tier: &str) {
    if let Err(e) = cache.put(key, entry).await {
        tracing::warn!(key = %key, tier, error = %e, "Screen cache write failed");
    }
}
