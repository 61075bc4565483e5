//! Cache-aside layer over a `CacheStore`
//!
//! Reads never fail: store errors, timeouts and undecodable values are misses.
//! Concurrent misses on the same key may each compute the value; there is no
//! stampede protection.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::analytics::EntityRef;
use crate::domain::cache::CacheStore;
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_cache_invalidation, record_cache_lookup};

/// Tuning for the cache layer
#[derive(Debug, Clone)]
pub struct CacheLayerConfig {
    /// Upper bound for a single store call
    pub store_timeout: Duration,
    /// Upper bound for a prefix scan, which walks the keyspace
    pub prefix_scan_timeout: Duration,
    /// Pages deleted per entity when the store cannot scan by prefix
    pub max_enumerated_pages: u32,
}

impl Default for CacheLayerConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(250),
            prefix_scan_timeout: Duration::from_secs(5),
            max_enumerated_pages: 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheLayer {
    store: Arc<dyn CacheStore>,
    config: CacheLayerConfig,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheLayerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    async fn bounded<T>(
        &self,
        key: &str,
        call: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        tokio::time::timeout(self.config.store_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(DomainError::cache(format!(
                    "Store call for '{}' timed out after {:?}",
                    key, self.config.store_timeout
                )))
            })
    }

    /// Cached value for `key`, or `None` on miss
    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let raw = match self.bounded(key, self.store.get_raw(key)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                record_cache_lookup("miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, event = "cache_read_failed", "Cache read failed, treating as miss");
                record_cache_lookup("error");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                record_cache_lookup("hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                record_cache_lookup("miss");
                if let Err(e) = self.bounded(key, self.store.delete(key)).await {
                    debug!(key, error = %e, "Failed to delete undecodable cache entry");
                }
                None
            }
        }
    }

    pub async fn set<V: Serialize>(&self, key: &str, value: &V, ttl: Duration) -> Result<(), DomainError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| DomainError::cache(format!("Failed to serialize value for '{}': {}", key, e)))?;

        self.bounded(key, self.store.set_raw(key, &raw, ttl)).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        self.bounded(key, self.store.delete(key)).await
    }

    /// Delete every key under `prefix`; `Unsupported` when the store cannot scan
    pub async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, DomainError> {
        self.scan_prefix(prefix).await.unwrap_or_else(|_| {
            Err(DomainError::cache(format!(
                "Prefix scan for '{}' timed out after {:?}",
                prefix, self.config.prefix_scan_timeout
            )))
        })
    }

    async fn scan_prefix(
        &self,
        prefix: &str,
    ) -> Result<Result<usize, DomainError>, tokio::time::error::Elapsed> {
        tokio::time::timeout(self.config.prefix_scan_timeout, self.store.delete_prefix(prefix)).await
    }

    /// Drop every cached query of an entity
    ///
    /// Falls back to deleting the enumerated page keys plus the bare entity key when
    /// the store cannot scan or the scan times out; pages past `max_enumerated_pages`
    /// survive until their TTL runs out.
    pub async fn invalidate_entity(&self, entity: &EntityRef) -> Result<usize, DomainError> {
        let removed = match self.scan_prefix(&entity.key_prefix()).await {
            Ok(Ok(removed)) => {
                let bare = entity.to_string();
                removed + usize::from(self.delete(&bare).await?)
            }
            Ok(Err(DomainError::Unsupported { .. })) => {
                debug!(entity = %entity, "Store cannot scan, deleting enumerated keys");
                self.delete_enumerated(entity).await?
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(
                    entity = %entity,
                    timeout_ms = self.config.prefix_scan_timeout.as_millis() as u64,
                    "Prefix scan timed out, deleting enumerated keys"
                );
                self.delete_enumerated(entity).await?
            }
        };

        record_cache_invalidation(removed);
        info!(entity = %entity, removed, event = "cache_invalidated", "Invalidated cached entity");

        Ok(removed)
    }

    async fn delete_enumerated(&self, entity: &EntityRef) -> Result<usize, DomainError> {
        let mut keys = entity.enumerated_keys(self.config.max_enumerated_pages);
        keys.push(entity.to_string());

        Ok(try_join_all(keys.iter().map(|key| self.delete(key)))
            .await?
            .into_iter()
            .filter(|deleted| *deleted)
            .count())
    }

    /// Return the cached value, or compute, store and return it
    ///
    /// A failed write is logged and the computed value is still returned. Factory
    /// errors propagate and nothing is cached.
    pub async fn get_or_compute<V, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        factory: F,
    ) -> Result<V, DomainError>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, DomainError>>,
    {
        if let Some(cached) = self.get(key).await {
            debug!(key, "Cache hit");
            return Ok(cached);
        }

        let value = factory().await?;

        if let Err(e) = self.set(key, &value, ttl).await {
            warn!(key, error = %e, event = "cache_write_failed", "Cache write failed, returning computed value");
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCacheStore;
    use crate::infrastructure::cache::InMemoryCache;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn layer_with(store: impl CacheStore + 'static) -> CacheLayer {
        CacheLayer::new(Arc::new(store), CacheLayerConfig::default())
    }

    #[tokio::test]
    async fn test_get_or_compute_calls_factory_once() {
        let layer = layer_with(InMemoryCache::new());
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(30);

        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"tvl": 42}))
        };

        let first: serde_json::Value = layer.get_or_compute("pool:X:0", ttl, compute).await.unwrap();
        let second: serde_json::Value = layer.get_or_compute("pool:X:0", ttl, compute).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let layer = layer_with(InMemoryCache::new());

        layer.set("pool:X", &json!({"v": 1}), Duration::from_secs(5)).await.unwrap();
        assert_eq!(layer.get::<serde_json::Value>("pool:X").await, Some(json!({"v": 1})));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(layer.get::<serde_json::Value>("pool:X").await, None);
    }

    #[tokio::test]
    async fn test_factory_error_is_not_cached() {
        let layer = layer_with(InMemoryCache::new());

        let result: Result<serde_json::Value, _> = layer
            .get_or_compute("k", Duration::from_secs(30), || async {
                Err(DomainError::resolver("backend down"))
            })
            .await;

        assert!(matches!(result, Err(DomainError::Resolver { .. })));
        assert!(layer.get::<serde_json::Value>("k").await.is_none());
    }

    #[tokio::test]
    async fn test_store_error_is_miss_and_value_still_returned() {
        let layer = layer_with(MockCacheStore::new().with_error("connection refused"));

        assert!(layer.get::<String>("k").await.is_none());

        let value: String = layer
            .get_or_compute("k", Duration::from_secs(30), || async { Ok("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_is_miss() {
        let layer = layer_with(MockCacheStore::new().with_entry("k", "\"cached\"").with_delay(Duration::from_secs(1)));

        assert!(layer.get::<String>("k").await.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_value_is_miss_and_deleted() {
        let store = Arc::new(MockCacheStore::new().with_entry("k", "{not json"));
        let layer = CacheLayer::new(store.clone(), CacheLayerConfig::default());

        assert!(layer.get::<serde_json::Value>("k").await.is_none());
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_entity_with_prefix_scan() {
        let store = Arc::new(
            MockCacheStore::new()
                .with_entry("pool:X:0", "1")
                .with_entry("pool:X:7", "2")
                .with_entry("pool:X", "3")
                .with_entry("pool:XY:0", "4"),
        );
        let layer = CacheLayer::new(store.clone(), CacheLayerConfig::default());

        let removed = layer
            .invalidate_entity(&EntityRef::new("pool", "X").unwrap())
            .await
            .unwrap();

        assert_eq!(removed, 3);
        assert_eq!(store.keys(), vec!["pool:XY:0".to_string()]);
    }

    #[tokio::test]
    async fn test_invalidate_entity_without_prefix_scan() {
        let store = Arc::new(
            MockCacheStore::new()
                .without_prefix_scan()
                .with_entry("pool:X:0", "1")
                .with_entry("pool:X:3", "2")
                .with_entry("pool:X:40", "3"),
        );
        let layer = CacheLayer::new(
            store.clone(),
            CacheLayerConfig {
                max_enumerated_pages: 4,
                ..Default::default()
            },
        );

        let removed = layer
            .invalidate_entity(&EntityRef::new("pool", "X").unwrap())
            .await
            .unwrap();

        // Pages beyond the enumeration bound are left to expire
        assert_eq!(removed, 2);
        assert_eq!(store.keys(), vec!["pool:X:40".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_prefix_scan_falls_back_to_enumerated_keys() {
        let store = Arc::new(
            MockCacheStore::new()
                .with_delay(Duration::from_millis(500))
                .with_entry("pool:X:0", "1")
                .with_entry("pool:X:3", "2")
                .with_entry("pool:X", "3")
                .with_entry("pool:X:40", "4"),
        );
        let layer = CacheLayer::new(
            store.clone(),
            CacheLayerConfig {
                store_timeout: Duration::from_secs(2),
                prefix_scan_timeout: Duration::from_millis(100),
                max_enumerated_pages: 4,
            },
        );

        let removed = layer
            .invalidate_entity(&EntityRef::new("pool", "X").unwrap())
            .await
            .unwrap();

        assert_eq!(removed, 3);
        assert_eq!(store.keys(), vec!["pool:X:40".to_string()]);

        let err = layer.delete_by_prefix("pool:").await.unwrap_err();
        assert!(err.is_store_failure());
        assert_eq!(store.keys(), vec!["pool:X:40".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefix_scan_is_not_bound_by_store_timeout() {
        let store = Arc::new(
            MockCacheStore::new()
                .with_delay(Duration::from_secs(1))
                .with_entry("pool:X:0", "1")
                .with_entry("pool:X:40", "2"),
        );
        let layer = CacheLayer::new(store.clone(), CacheLayerConfig::default());

        assert_eq!(layer.delete_by_prefix("pool:X:").await.unwrap(), 2);
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_entity_surfaces_store_errors() {
        let layer = layer_with(MockCacheStore::new().with_error("down"));

        let err = layer
            .invalidate_entity(&EntityRef::new("pool", "X").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_store_failure());
    }
}
