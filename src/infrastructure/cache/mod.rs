//! Store implementations and the cache-aside layer built on them

mod factory;
mod in_memory;
mod layer;
mod redis;

pub use factory::{CacheFactory, CacheType, StoreConfig};
pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use layer::{CacheLayer, CacheLayerConfig};
pub use redis::{RedisCache, RedisCacheConfig};
