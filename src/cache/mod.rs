//! Screen payload caching.
//!
//! ```text
//!   CachingScreenFetcher::load(request)
//!     │  policy = resolver.resolve(request)
//!     ├─→ memory cache ── hit ──→ screen
//!     ├─→ disk cache ──── hit ──→ promote to memory ──→ screen
//!     └─→ ScreenFetcher ──→ validate ──→ store per policy ──→ screen
//! ```
//!
//! Both cache implementations honor the same contract: expired entries are
//! never returned and are purged lazily on read.

mod disk;
mod fetcher;
mod memory;
mod policy;
mod storage;

use std::time::SystemTime;

use async_trait::async_trait;
use thiserror::Error;

use crate::screen::Screen;

pub use disk::DiskScreenCache;
pub use fetcher::{CachingScreenFetcher, CachingScreenFetcherBuilder, ScreenFetcher};
pub use memory::MemoryScreenCache;
pub use policy::{CachePolicy, CachePolicyResolver, ConfiguredPolicyResolver};
pub use storage::{restore_key, sanitize_key, DiskStorage, FileDiskStorage, StorageError};

/// A cached screen and its absolute expiry (`None` never expires).
#[derive(Debug, Clone, PartialEq)]
pub struct CachedScreenEntry {
    pub screen: Screen,
    pub expires_at: Option<SystemTime>,
}

impl CachedScreenEntry {
    pub fn new(screen: Screen, expires_at: Option<SystemTime>) -> Self {
        Self { screen, expires_at }
    }

    /// An entry is no longer valid once its expiry is reached.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Strictly past expiry, as used by [`ScreenCache::clear_expired`].
    fn expired_before(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

/// Errors raised by screen caches.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to encode cached screen '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Keyed store of screen payloads with TTL expiry.
#[async_trait]
pub trait ScreenCache: Send + Sync {
    /// Returns `None` on miss or when the entry has expired.
    async fn get(&self, key: &str) -> Result<Option<CachedScreenEntry>, CacheError>;

    /// Unconditional upsert.
    async fn put(&self, key: &str, entry: CachedScreenEntry) -> Result<(), CacheError>;

    /// Returns whether an entry was present.
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every entry whose expiry is strictly before `now`. Entries
    /// without expiry are kept. Returns the number removed.
    async fn clear_expired(&self, now: SystemTime) -> Result<usize, CacheError>;
}
