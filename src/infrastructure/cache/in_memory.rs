//! In-memory store implementation using moka

use std::time::{Duration, Instant as StdInstant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::ops::compute::Op;
use moka::Expiry;
use tokio::time::Instant;

use crate::domain::cache::CacheStore;
use crate::domain::DomainError;

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    Counter(i64),
}

/// Entry stored in moka
#[derive(Debug, Clone)]
struct CacheEntry {
    value: StoredValue,
    /// Read on the tokio clock so paused-time tests observe expiry
    deadline: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Evicts each entry at its own deadline
struct DeadlineExpiry;

impl Expiry<String, CacheEntry> for DeadlineExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: StdInstant,
    ) -> Option<Duration> {
        Some(value.remaining())
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: StdInstant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.remaining())
    }
}

/// Process-local store for single-instance deployments and tests
///
/// Expiry is checked against each entry's deadline on every read; moka's own
/// per-entry expiry only reclaims memory.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(DeadlineExpiry)
            .build();

        Self { cache }
    }

    async fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.cache.get(key).await?;

        if entry.is_expired() {
            self.cache.invalidate(key).await;
            return None;
        }

        Some(entry)
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.live_entry(key).await.map(|entry| match entry.value {
            StoredValue::Text(data) => data,
            StoredValue::Counter(n) => n.to_string(),
        }))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let entry = CacheEntry {
            value: StoredValue::Text(value.to_string()),
            deadline: Instant::now() + ttl,
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self
            .cache
            .remove(key)
            .await
            .is_some_and(|entry| !entry.is_expired()))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;

        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        let mut deleted = 0;
        for key in keys {
            if self.delete(&key).await? {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn increment_with_ttl(
        &self,
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64, DomainError> {
        let mut non_counter = false;

        // Computed under moka's per-key lock, so concurrent increments are not lost
        let result = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|existing| {
                let op = match existing.map(|e| e.into_value()) {
                    Some(entry) if !entry.is_expired() => match entry.value {
                        StoredValue::Counter(n) => Op::Put(CacheEntry {
                            value: StoredValue::Counter(n + delta),
                            deadline: entry.deadline,
                        }),
                        StoredValue::Text(_) => {
                            non_counter = true;
                            Op::Nop
                        }
                    },
                    _ => Op::Put(CacheEntry {
                        value: StoredValue::Counter(delta),
                        deadline: Instant::now() + ttl,
                    }),
                };
                std::future::ready(op)
            })
            .await;

        if non_counter {
            return Err(DomainError::cache(format!(
                "Value at '{}' is not a counter",
                key
            )));
        }

        match result.into_entry().map(|e| e.into_value().value) {
            Some(StoredValue::Counter(n)) => Ok(n),
            _ => Err(DomainError::cache(format!("Counter '{}' was not stored", key))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.live_entry(key).await.is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
        Ok(self.live_entry(key).await.map(|entry| entry.remaining()))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
