//! File-backed screen cache.
//!
//! Each entry is stored as a two-part text record:
//!
//! ```text
//! <expires_at millis since epoch, or -1 for no expiry>
//! <screen JSON>
//! ```
//!
//! Records that fail to parse are treated as misses and deleted.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

use super::storage::{restore_key, sanitize_key, DiskStorage};
use super::{CacheError, CachedScreenEntry, ScreenCache};
use crate::clock::{from_millis, to_millis, Clock, SystemClock};
use crate::screen::Screen;

const NO_EXPIRY: i64 = -1;

pub struct DiskScreenCache {
    storage: Arc<dyn DiskStorage>,
    clock: Arc<dyn Clock>,
}

impl DiskScreenCache {
    pub fn new(storage: Arc<dyn DiskStorage>) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    pub fn with_clock(storage: Arc<dyn DiskStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Request keys currently on disk, expired or not.
    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let stored = self.storage.list_keys().await?;
        Ok(stored.iter().filter_map(|key| restore_key(key)).collect())
    }

    /// Read and decode one record. Corrupt records are deleted.
    async fn load(&self, storage_key: &str) -> Result<Option<CachedScreenEntry>, CacheError> {
        let Some(text) = self.storage.read(storage_key).await? else {
            return Ok(None);
        };

        match decode_record(&text) {
            Some(entry) => Ok(Some(entry)),
            None => {
                tracing::warn!(key = %storage_key, "Discarding corrupt screen cache record");
                self.storage.delete(storage_key).await?;
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for DiskScreenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskScreenCache").finish_non_exhaustive()
    }
}

#[async_trait]
impl ScreenCache for DiskScreenCache {
    async fn get(&self, key: &str) -> Result<Option<CachedScreenEntry>, CacheError> {
        let storage_key = sanitize_key(key);
        let Some(entry) = self.load(&storage_key).await? else {
            return Ok(None);
        };

        if entry.is_expired(self.clock.now()) {
            self.storage.delete(&storage_key).await?;
            tracing::debug!(key = %key, "Purged expired disk cache entry");
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn put(&self, key: &str, entry: CachedScreenEntry) -> Result<(), CacheError> {
        let record = encode_record(&entry).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.storage.write(&sanitize_key(key), &record).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.storage.delete(&sanitize_key(key)).await?)
    }

    async fn clear_expired(&self, now: SystemTime) -> Result<usize, CacheError> {
        let mut removed = 0;
        for storage_key in self.storage.list_keys().await? {
            let Some(entry) = self.load(&storage_key).await? else {
                continue;
            };
            if entry.expired_before(now) && self.storage.delete(&storage_key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn encode_record(entry: &CachedScreenEntry) -> Result<String, serde_json::Error> {
    let expires = entry
        .expires_at
        .map(|at| to_millis(at) as i64)
        .unwrap_or(NO_EXPIRY);
    let payload = serde_json::to_string(&entry.screen)?;
    Ok(format!("{}\n{}", expires, payload))
}

fn decode_record(text: &str) -> Option<CachedScreenEntry> {
    let (header, payload) = text.split_once('\n')?;
    let expires_at = match header.trim().parse::<i64>().ok()? {
        NO_EXPIRY => None,
        millis if millis >= 0 => Some(from_millis(millis as u64)),
        _ => return None,
    };
    let screen: Screen = serde_json::from_str(payload).ok()?;
    Some(CachedScreenEntry::new(screen, expires_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileDiskStorage;
    use crate::clock::ManualClock;
    use std::time::Duration;
    use tempfile::TempDir;

    fn cache_in(dir: &TempDir, clock: &ManualClock) -> (DiskScreenCache, Arc<FileDiskStorage>) {
        let storage = Arc::new(FileDiskStorage::new(dir.path()));
        let cache = DiskScreenCache::with_clock(storage.clone(), Arc::new(clock.clone()));
        (cache, storage)
    }

    #[test]
    fn record_format() {
        let entry = CachedScreenEntry::new(Screen::new("home"), None);
        let record = encode_record(&entry).unwrap();
        assert!(record.starts_with("-1\n{"));
        assert_eq!(decode_record(&record), Some(entry));

        let timed = CachedScreenEntry::new(Screen::new("home"), Some(from_millis(5_000)));
        assert!(encode_record(&timed).unwrap().starts_with("5000\n"));

        assert_eq!(decode_record("no newline"), None);
        assert_eq!(decode_record("-7\n{}"), None);
    }

    #[tokio::test]
    async fn round_trips_through_files_and_expires() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::at_millis(10_000);
        let (cache, _) = cache_in(&dir, &clock);
        let expires = clock.now() + Duration::from_secs(30);

        cache
            .put("feed?page=2", CachedScreenEntry::new(Screen::new("feed"), Some(expires)))
            .await
            .unwrap();
        let hit = cache.get("feed?page=2").await.unwrap().unwrap();
        assert_eq!(hit.screen.id, "feed");
        assert_eq!(hit.expires_at, Some(expires));
        assert_eq!(cache.keys().await.unwrap(), vec!["feed?page=2".to_string()]);

        clock.advance(Duration::from_secs(30));
        assert!(cache.get("feed?page=2").await.unwrap().is_none());
        assert!(cache.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_record_is_a_miss_and_deleted() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::at_millis(0);
        let (cache, storage) = cache_in(&dir, &clock);

        storage.write("home", "garbage").await.unwrap();
        assert!(cache.get("home").await.unwrap().is_none());
        assert_eq!(storage.read("home").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_expired_sweeps_only_past_entries() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::at_millis(0);
        let (cache, _) = cache_in(&dir, &clock);
        let now = clock.now();

        for (key, expires) in [
            ("past", Some(now)),
            ("future", Some(now + Duration::from_secs(100))),
            ("forever", None),
        ] {
            cache
                .put(key, CachedScreenEntry::new(Screen::new(key), expires))
                .await
                .unwrap();
        }

        let removed = cache
            .clear_expired(now + Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            cache.keys().await.unwrap(),
            vec!["forever".to_string(), "future".to_string()]
        );
    }
}
