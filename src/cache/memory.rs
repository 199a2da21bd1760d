use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CacheError, CachedScreenEntry, ScreenCache};
use crate::clock::{Clock, SystemClock};

/// In-process screen cache.
pub struct MemoryScreenCache {
    entries: Mutex<HashMap<String, CachedScreenEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryScreenCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryScreenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryScreenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryScreenCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[async_trait]
impl ScreenCache for MemoryScreenCache {
    async fn get(&self, key: &str) -> Result<Option<CachedScreenEntry>, CacheError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                tracing::debug!(key = %key, "Purged expired memory cache entry");
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, entry: CachedScreenEntry) -> Result<(), CacheError> {
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn clear_expired(&self, now: SystemTime) -> Result<usize, CacheError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.expired_before(now));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::screen::Screen;
    use std::time::Duration;

    #[tokio::test]
    async fn expired_entries_are_misses_and_purged() {
        let clock = ManualClock::at_millis(1_000);
        let cache = MemoryScreenCache::with_clock(Arc::new(clock.clone()));
        let expires = clock.now() + Duration::from_secs(10);

        cache
            .put("home", CachedScreenEntry::new(Screen::new("home"), Some(expires)))
            .await
            .unwrap();
        assert!(cache.get("home").await.unwrap().is_some());

        clock.advance(Duration::from_secs(10));
        assert!(cache.get("home").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn clear_expired_keeps_unbounded_entries() {
        let clock = ManualClock::at_millis(0);
        let cache = MemoryScreenCache::with_clock(Arc::new(clock.clone()));
        let now = clock.now();

        let entry = |id: &str, expires| CachedScreenEntry::new(Screen::new(id), expires);
        cache.put("old", entry("old", Some(now))).await.unwrap();
        cache
            .put("fresh", entry("fresh", Some(now + Duration::from_secs(60))))
            .await
            .unwrap();
        cache.put("forever", entry("forever", None)).await.unwrap();

        let removed = cache
            .clear_expired(now + Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 2);
        assert!(!cache.remove("old").await.unwrap());
        assert!(cache.remove("forever").await.unwrap());
    }
}
