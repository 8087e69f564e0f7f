//! Cache backend seam and the fail-soft JSON handle over it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::keys::CacheKey;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("subscription closed")]
    SubscriptionClosed,
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Key-value store plus pub/sub, as offered by Redis.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), CacheError>;
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn BusSubscription>, CacheError>;
}

/// Handle onto one subscribed bus channel.
#[async_trait]
pub trait BusSubscription: Send {
    /// Wait up to `wait` for the next message; `None` on a quiet channel.
    async fn next_message(&mut self, wait: Duration) -> Result<Option<String>, CacheError>;
}

/// JSON boundary and fail-soft policy over a [`CacheBackend`].
///
/// Reads return `None` on any backend or decode failure; writes and deletes
/// swallow failures. Callers degrade to direct store access instead of
/// surfacing cache trouble. Only `subscribe` reports errors, because the bus
/// listener has to know its channels are dead.
#[derive(Clone)]
pub struct CacheHandle {
    backend: Arc<dyn CacheBackend>,
}

impl CacheHandle {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Cache-aside read: `None` covers absent, expired, unreachable, and
    /// malformed entries alike. Malformed JSON is logged and treated as a
    /// miss — it must never reach the caller as an error.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let rendered = key.render();
        let raw = match self.backend.get(&rendered).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                counter!("scorta_cache_miss_total").increment(1);
                return None;
            }
            Err(err) => {
                counter!("scorta_cache_miss_total").increment(1);
                warn!(key = %rendered, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                counter!("scorta_cache_hit_total").increment(1);
                Some(value)
            }
            Err(err) => {
                counter!("scorta_cache_decode_failure_total").increment(1);
                warn!(key = %rendered, error = %err, "failed to decode cached value");
                None
            }
        }
    }

    /// Populate `key` with the JSON form of `value` under the key's TTL class.
    pub async fn put_json<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let rendered = key.render();
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = %rendered, error = %err, "failed to serialize cache value");
                return;
            }
        };
        if let Err(err) = self.backend.set(&rendered, &raw, key.ttl()).await {
            warn!(key = %rendered, error = %err, "cache write failed");
        }
    }

    /// Best-effort forget of a single key.
    pub async fn forget(&self, key: &CacheKey) {
        let rendered = key.render();
        if let Err(err) = self.backend.delete(&rendered).await {
            warn!(key = %rendered, error = %err, "cache delete failed");
        }
    }

    /// Best-effort forget of an enumerated invalidation set.
    pub async fn forget_all(&self, keys: &[CacheKey]) {
        for key in keys {
            self.forget(key).await;
        }
        debug!(count = keys.len(), "cache invalidation set processed");
    }

    /// Publish a JSON message on `channel`. Returns whether the publish
    /// reached the backend; a lost notification is logged, never raised.
    pub async fn publish_json<T: Serialize>(&self, channel: &str, message: &T) -> bool {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(channel, error = %err, "failed to serialize bus message");
                return false;
            }
        };
        match self.backend.publish(channel, &payload).await {
            Ok(()) => true,
            Err(err) => {
                warn!(channel, error = %err, "bus publish failed, notification skipped");
                false
            }
        }
    }

    pub async fn subscribe(&self, channel: &str) -> Result<Box<dyn BusSubscription>, CacheError> {
        self.backend.subscribe(channel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    /// Backend that fails every operation, for the degradation paths.
    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::backend("connection refused"))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::backend("connection refused"))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::backend("connection refused"))
        }
        async fn publish(&self, _channel: &str, _payload: &str) -> Result<(), CacheError> {
            Err(CacheError::backend("connection refused"))
        }
        async fn subscribe(&self, _channel: &str) -> Result<Box<dyn BusSubscription>, CacheError> {
            Err(CacheError::backend("connection refused"))
        }
    }

    #[tokio::test]
    async fn backend_failures_read_as_misses() {
        let handle = CacheHandle::new(Arc::new(BrokenBackend));
        let key = CacheKey::InventoryItem(1);

        let value: Option<i64> = handle.get_json(&key).await;
        assert_eq!(value, None);

        // Writes, deletes, and publishes must not propagate either.
        handle.put_json(&key, &42i64).await;
        handle.forget(&key).await;
        assert!(!handle.publish_json("inventory:updates", &42i64).await);
    }

    #[tokio::test]
    async fn malformed_cached_json_is_a_miss() {
        let backend = Arc::new(MemoryCache::new());
        backend
            .set("inventory:item:1", "{not json", Duration::from_secs(60))
            .await
            .unwrap();

        let handle = CacheHandle::new(backend);
        let value: Option<serde_json::Value> = handle.get_json(&CacheKey::InventoryItem(1)).await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn round_trip_through_handle() {
        let handle = CacheHandle::new(Arc::new(MemoryCache::new()));
        let key = CacheKey::CurrentPrice(5);

        handle.put_json(&key, &vec![1i64, 2, 3]).await;
        let value: Option<Vec<i64>> = handle.get_json(&key).await;
        assert_eq!(value, Some(vec![1, 2, 3]));

        handle.forget(&key).await;
        let value: Option<Vec<i64>> = handle.get_json(&key).await;
        assert_eq!(value, None);
    }
}
