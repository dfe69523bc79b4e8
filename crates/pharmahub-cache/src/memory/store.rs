//! moka-backed cache with per-entry TTL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use pharmahub_core::config::MemoryCacheConfig;
use pharmahub_core::result::AppResult;
use pharmahub_core::traits::CacheProvider;

/// A cached value and the TTL it was written with.
#[derive(Debug, Clone)]
struct Slot {
    value: String,
    ttl: Duration,
}

/// Expires each slot after its own TTL, restarting on overwrite.
struct SlotExpiry;

impl Expiry<String, Slot> for SlotExpiry {
    fn expire_after_create(&self, _key: &String, slot: &Slot, _created_at: Instant) -> Option<Duration> {
        Some(slot.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        _updated_at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(slot.ttl)
    }
}

/// Single-node cache provider.
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    cache: Cache<String, Slot>,
}

impl MemoryCacheProvider {
    /// Build the cache from configuration.
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(SlotExpiry)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.cache.get(key).await.map(|slot| slot.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.cache
            .insert(
                key.to_string(),
                Slot {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<u64> {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.to_string())
            .collect();

        for key in &keys {
            self.cache.invalidate(key).await;
        }

        debug!(prefix, count = keys.len(), "Evicted cache keys by prefix");
        Ok(keys.len() as u64)
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let slot = Slot {
            value: value.to_string(),
            ttl,
        };
        let entry = self
            .cache
            .entry(key.to_string())
            .or_insert_with(async move { slot })
            .await;
        Ok(entry.is_fresh())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> MemoryCacheProvider {
        MemoryCacheProvider::new(&MemoryCacheConfig { max_capacity: 1_000 })
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = provider();
        cache
            .set("notif:unread:a", "3", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("notif:unread:a").await.unwrap(), Some("3".into()));

        cache.delete("notif:unread:a").await.unwrap();
        assert_eq!(cache.get("notif:unread:a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_nx_only_first_wins() {
        let cache = provider();
        let ttl = Duration::from_secs(60);
        assert!(cache.set_nx("lock:job:digest", "node-a", ttl).await.unwrap());
        assert!(!cache.set_nx("lock:job:digest", "node-b", ttl).await.unwrap());
        assert_eq!(
            cache.get("lock:job:digest").await.unwrap(),
            Some("node-a".into())
        );
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let cache = provider();
        let ttl = Duration::from_secs(60);
        cache.set("notif:unread:u1:w1", "1", ttl).await.unwrap();
        cache.set("notif:unread:u1:w2", "2", ttl).await.unwrap();
        cache.set("notif:unread:u2:w1", "5", ttl).await.unwrap();

        assert_eq!(cache.delete_prefix("notif:unread:u1:").await.unwrap(), 2);
        assert_eq!(cache.get("notif:unread:u2:w1").await.unwrap(), Some("5".into()));
    }
}
