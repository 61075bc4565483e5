//! Key-value store trait shared by the quota enforcer and the cache layer

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Key-value store with per-key TTL and atomic counters
///
/// Values are opaque strings so the trait stays dyn-compatible; typed access
/// lives in the cache layer. Every write carries an explicit TTL.
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Reads a value; expired entries are misses
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Writes a value with a TTL
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Deletes a value, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Deletes every key starting with `prefix`, returning how many were removed
    ///
    /// Stores that cannot enumerate keys report `DomainError::Unsupported`.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, DomainError> {
        Err(DomainError::unsupported(format!(
            "prefix scan for '{}' is not available on this store",
            prefix
        )))
    }

    /// Atomically adds `delta` to a counter and returns the new value
    ///
    /// The TTL is applied only when this call creates the counter, so it is
    /// discarded at the end of the window it was created for.
    async fn increment_with_ttl(
        &self,
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64, DomainError>;

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Remaining TTL of a key, if it exists
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError>;

    /// Round-trip used by readiness probes
    async fn ping(&self) -> Result<(), DomainError> {
        self.exists("__ping__").await.map(|_| ())
    }
}
