//! In-memory cache implementation using moka
//!
//! Values are stored as JSON so any serializable payload can be cached under
//! a string key. Entries expire after the configured TTL.
//!
//! Every invalidation bumps a generation counter. A reader that loads data
//! after observing generation `g` stores it with [`MemoryCache::set_if_unchanged`],
//! which drops the value if an invalidation ran in between.

use anyhow::{Context, Result};
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// In-memory cache using moka
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    ttl: Duration,
    generation: AtomicU64,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("ttl", &self.ttl)
            .field("generation", &self.generation())
            .finish()
    }
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, ttl)
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_seconds))
    }

    pub fn with_capacity_and_ttl(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self {
            cache,
            ttl,
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let entry = CacheEntry::new(value)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    /// Current invalidation generation; read it before loading the data to cache
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Store `value` unless an invalidation ran since `generation` was read.
    ///
    /// Returns whether the value was kept.
    pub async fn set_if_unchanged<T: Serialize>(&self, key: &str, value: &T, generation: u64) -> Result<bool> {
        if self.generation() != generation {
            return Ok(false);
        }
        self.set(key, value).await?;
        // An invalidation may have finished between the check and the insert
        if self.generation() != generation {
            self.cache.invalidate(key).await;
            return Ok(false);
        }
        Ok(true)
    }

    pub async fn delete(&self, key: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate(key).await;
    }

    /// Delete every key matching a glob pattern (`*` any run, `?` one char)
    pub async fn delete_pattern(&self, pattern: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| pattern_matches(pattern, key.as_ref()))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys {
            self.cache.invalidate(&key).await;
        }
    }

    pub async fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

fn pattern_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();
    glob_match(&pattern, &key)
}

fn glob_match(pattern: &[char], key: &[char]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some(('*', rest)) => {
            glob_match(rest, key) || (!key.is_empty() && glob_match(pattern, &key[1..]))
        }
        Some(('?', rest)) => !key.is_empty() && glob_match(rest, &key[1..]),
        Some((c, rest)) => key.first() == Some(c) && glob_match(rest, &key[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cache() -> MemoryCache {
        MemoryCache::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = cache();
        cache.set("key1", &vec![1, 2, 3]).await.unwrap();

        let result: Option<Vec<i32>> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some(vec![1, 2, 3]));
        assert_eq!(cache.get::<Vec<i32>>("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_pattern_keeps_other_keys() {
        let cache = cache();
        cache.set("ads:sidebar", &"a").await.unwrap();
        cache.set("ads:footer", &"b").await.unwrap();
        cache.set("other", &"c").await.unwrap();

        cache.delete_pattern("ads:*").await;

        assert_eq!(cache.get::<String>("ads:sidebar").await.unwrap(), None);
        assert_eq!(cache.get::<String>("ads:footer").await.unwrap(), None);
        assert_eq!(cache.get::<String>("other").await.unwrap(), Some("c".to_string()));
    }

    #[tokio::test]
    async fn test_load_started_before_invalidation_is_not_cached() {
        let cache = cache();
        let generation = cache.generation();

        // A write lands while the reader is still loading
        cache.delete_pattern("ads:*").await;

        assert!(!cache.set_if_unchanged("ads:sidebar", &"stale", generation).await.unwrap());
        assert_eq!(cache.get::<String>("ads:sidebar").await.unwrap(), None);

        let generation = cache.generation();
        assert!(cache.set_if_unchanged("ads:sidebar", &"fresh", generation).await.unwrap());
        assert_eq!(cache.get::<String>("ads:sidebar").await.unwrap(), Some("fresh".to_string()));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new(Duration::from_millis(10));
        cache.set("k", &"v").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.cache.run_pending_tasks().await;
        assert_eq!(cache.get::<String>("k").await.unwrap(), None);
    }

    #[test]
    fn test_glob() {
        assert!(pattern_matches("ads:*", "ads:"));
        assert!(pattern_matches("user:?:x", "user:1:x"));
        assert!(!pattern_matches("user:?:x", "user:12:x"));
        assert!(!pattern_matches("ads:*", "ad:sidebar"));
    }

    proptest! {
        #[test]
        fn star_matches_any_suffix(prefix in "[a-z:]{0,8}", suffix in "[a-z0-9:]{0,12}") {
            let pattern = format!("{}*", prefix);
            let key = format!("{}{}", prefix, suffix);
            prop_assert!(pattern_matches(&pattern, &key));
        }
    }
}
