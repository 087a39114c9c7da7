use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Small time-bounded cache. Entries are evicted lazily on read and when
/// the map grows past `capacity`.
pub struct TtlCache<K, V> {
    ttl: Duration,
    capacity: usize,
    entries: RwLock<HashMap<K, (Instant, V)>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((stored_at, value)) if stored_at.elapsed() < self.ttl => {
                    return Some(value.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it under the write lock
        self.entries.write().await.remove(key);
        None
    }

    pub async fn insert(&self, key: K, value: V) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity {
            let ttl = self.ttl;
            entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        }
        if entries.len() >= self.capacity {
            // Still full of live entries; start over rather than track recency
            entries.clear();
        }
        entries.insert(key, (Instant::now(), value));
    }

    pub async fn invalidate(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_fresh_entries() {
        let cache = TtlCache::new(Duration::from_secs(60), 16);
        cache.insert("a".to_string(), 1).await;
        assert_eq!(cache.get(&"a".to_string()).await, Some(1));
        assert_eq!(cache.get(&"b".to_string()).await, None);
    }

    #[tokio::test]
    async fn expires_entries() {
        let cache = TtlCache::new(Duration::from_millis(20), 16);
        cache.insert(1u32, "x").await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get(&1).await, None);
        assert_eq!(cache.entries.read().await.len(), 0);
    }

    #[tokio::test]
    async fn invalidate_and_capacity() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert(1u32, 1).await;
        cache.insert(2u32, 2).await;
        cache.invalidate(&1).await;
        assert_eq!(cache.get(&1).await, None);

        cache.insert(3u32, 3).await;
        cache.insert(4u32, 4).await;
        assert!(cache.entries.read().await.len() <= 2);
        assert_eq!(cache.get(&4).await, Some(4));
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = TtlCache::new(Duration::ZERO, 8);
        cache.insert(1u32, 1).await;
        assert_eq!(cache.entries.read().await.len(), 0);
    }
}
