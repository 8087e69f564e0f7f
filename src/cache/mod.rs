//! Cache-aside and pub/sub primitives.
//!
//! `CacheBackend` is the seam: Redis in production, an in-process store in
//! tests. `CacheHandle` layers the JSON boundary and the fail-soft policy on
//! top — the cache is strictly an optimization, never a correctness
//! dependency, so every backend failure degrades to a miss.

pub mod keys;
mod memory;
mod redis;
mod store;

pub use keys::CacheKey;
pub use memory::MemoryCache;
pub use redis::RedisCache;
pub use store::{BusSubscription, CacheBackend, CacheError, CacheHandle};
