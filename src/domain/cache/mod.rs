//! Cache domain - key-value store abstraction with TTL and atomic counters

mod repository;

pub use repository::CacheStore;

#[cfg(test)]
pub use repository::mock::MockCacheStore;
