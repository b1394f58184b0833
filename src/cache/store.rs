//! Cache store contract and in-memory implementation
//!
//! The [`CacheStore`] trait is the persistence boundary for all credential
//! state. [`MemoryStore`] implements it with DashMaps and per-entry TTLs;
//! expired entries are dropped on read and by [`MemoryStore::cleanup`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::types::Result;

/// Outcome of a conditional set against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// The value was written; the caller won the race.
    Inserted,
    /// A live value was already present; it is returned untouched.
    Existing(String),
}

/// Async key-value/hash store with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether a live string entry exists at `key`.
    async fn exists_string(&self, key: &str) -> Result<bool>;

    /// Load the live string entry at `key`, if any.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Write a string entry, replacing any previous value.
    async fn set_string_with_ttl(&self, key: &str, ttl: Duration, value: &str) -> Result<()>;

    /// Write a string entry only if no live entry exists.
    ///
    /// The atomic check-and-populate: concurrent callers racing to create the
    /// same entry observe exactly one winner, and losers receive the winning
    /// value.
    async fn set_string_if_absent(&self, key: &str, ttl: Duration, value: &str)
        -> Result<SetOutcome>;

    /// Whether a live field exists in the hash map at `map_key`.
    async fn exists_hash_field(&self, map_key: &str, field: &str) -> Result<bool>;

    /// Load a live hash-map field, if any.
    async fn get_hash_field(&self, map_key: &str, field: &str) -> Result<Option<String>>;

    /// Write a hash-map field with its own TTL.
    async fn set_hash_field(
        &self,
        map_key: &str,
        field: &str,
        ttl: Duration,
        value: &str,
    ) -> Result<()>;

    /// Drop an entire hash map and every field in it.
    async fn delete_hash_map(&self, map_key: &str) -> Result<()>;
}

/// A cached value with its expiry.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory TTL store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    strings: DashMap<String, CacheEntry>,
    maps: DashMap<String, DashMap<String, CacheEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries from both namespaces.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&self) -> usize {
        let mut removed = 0;

        self.strings.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });

        for map in self.maps.iter() {
            map.retain(|_, entry| {
                if entry.is_expired() {
                    removed += 1;
                    false
                } else {
                    true
                }
            });
        }
        self.maps.retain(|_, map| !map.is_empty());

        if removed > 0 {
            debug!(removed, "cleaned up expired cache entries");
        }
        removed
    }

    fn live_string(&self, key: &str) -> Option<String> {
        if let Some(entry) = self.strings.get(key) {
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
            drop(entry);
            self.strings.remove(key);
        }
        None
    }

    fn live_hash_field(&self, map_key: &str, field: &str) -> Option<String> {
        let map = self.maps.get(map_key)?;
        if let Some(entry) = map.get(field) {
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
            drop(entry);
            map.remove(field);
        }
        None
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn exists_string(&self, key: &str) -> Result<bool> {
        Ok(self.live_string(key).is_some())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live_string(key))
    }

    async fn set_string_with_ttl(&self, key: &str, ttl: Duration, value: &str) -> Result<()> {
        debug!(key, ttl_secs = ttl.as_secs(), "cache set");
        self.strings
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn set_string_if_absent(
        &self,
        key: &str,
        ttl: Duration,
        value: &str,
    ) -> Result<SetOutcome> {
        let outcome = match self.strings.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(CacheEntry::new(value, ttl));
                    SetOutcome::Inserted
                } else {
                    SetOutcome::Existing(occupied.get().value.clone())
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, ttl));
                SetOutcome::Inserted
            }
        };

        if matches!(outcome, SetOutcome::Inserted) {
            debug!(key, ttl_secs = ttl.as_secs(), "cache conditional set won");
        } else {
            debug!(key, "cache conditional set lost to existing entry");
        }
        Ok(outcome)
    }

    async fn exists_hash_field(&self, map_key: &str, field: &str) -> Result<bool> {
        Ok(self.live_hash_field(map_key, field).is_some())
    }

    async fn get_hash_field(&self, map_key: &str, field: &str) -> Result<Option<String>> {
        Ok(self.live_hash_field(map_key, field))
    }

    async fn set_hash_field(
        &self,
        map_key: &str,
        field: &str,
        ttl: Duration,
        value: &str,
    ) -> Result<()> {
        debug!(map_key, field, ttl_secs = ttl.as_secs(), "cache hash set");
        self.maps
            .entry(map_key.to_string())
            .or_default()
            .insert(field.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn delete_hash_map(&self, map_key: &str) -> Result<()> {
        if self.maps.remove(map_key).is_some() {
            debug!(map_key, "cache hash map deleted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_string_get_set() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        assert!(!store.exists_string("k").await.unwrap());
        assert!(store.get_string("k").await.unwrap().is_none());

        store.set_string_with_ttl("k", ttl, "v").await.unwrap();
        assert!(store.exists_string("k").await.unwrap());
        assert_eq!(store.get_string("k").await.unwrap().unwrap(), "v");
    }

    #[tokio::test]
    async fn test_string_expiry() {
        let store = MemoryStore::new();

        store
            .set_string_with_ttl("k", Duration::from_millis(10), "v")
            .await
            .unwrap();
        assert!(store.exists_string("k").await.unwrap());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!store.exists_string("k").await.unwrap());
        assert!(store.get_string("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_if_absent_first_wins() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        let first = store.set_string_if_absent("k", ttl, "a").await.unwrap();
        assert_eq!(first, SetOutcome::Inserted);

        let second = store.set_string_if_absent("k", ttl, "b").await.unwrap();
        assert_eq!(second, SetOutcome::Existing("a".to_string()));

        // The losing write never replaced the value
        assert_eq!(store.get_string("k").await.unwrap().unwrap(), "a");
    }

    #[tokio::test]
    async fn test_set_if_absent_replaces_expired() {
        let store = MemoryStore::new();

        store
            .set_string_if_absent("k", Duration::from_millis(10), "a")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let outcome = store
            .set_string_if_absent("k", Duration::from_secs(60), "b")
            .await
            .unwrap();
        assert_eq!(outcome, SetOutcome::Inserted);
        assert_eq!(store.get_string("k").await.unwrap().unwrap(), "b");
    }

    #[tokio::test]
    async fn test_hash_fields() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        assert!(!store.exists_hash_field("m", "f1").await.unwrap());

        store.set_hash_field("m", "f1", ttl, "v1").await.unwrap();
        store.set_hash_field("m", "f2", ttl, "v2").await.unwrap();

        assert!(store.exists_hash_field("m", "f1").await.unwrap());
        assert_eq!(
            store.get_hash_field("m", "f2").await.unwrap().unwrap(),
            "v2"
        );
    }

    #[tokio::test]
    async fn test_delete_hash_map_drops_all_fields() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        store.set_hash_field("m", "f1", ttl, "v1").await.unwrap();
        store.set_hash_field("m", "f2", ttl, "v2").await.unwrap();

        store.delete_hash_map("m").await.unwrap();
        assert!(!store.exists_hash_field("m", "f1").await.unwrap());
        assert!(!store.exists_hash_field("m", "f2").await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_field_expiry() {
        let store = MemoryStore::new();

        store
            .set_hash_field("m", "f", Duration::from_millis(10), "v")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.get_hash_field("m", "f").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired() {
        let store = MemoryStore::new();

        store
            .set_string_with_ttl("gone", Duration::from_millis(5), "v")
            .await
            .unwrap();
        store
            .set_string_with_ttl("kept", Duration::from_secs(60), "v")
            .await
            .unwrap();
        store
            .set_hash_field("m", "gone", Duration::from_millis(5), "v")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = store.cleanup();

        assert_eq!(removed, 2);
        assert!(store.exists_string("kept").await.unwrap());
    }
}
