//! In-process cache backend for tests and cache-unit coverage.
//!
//! Mirrors the Redis contract closely enough to exercise the cache-aside
//! and pub/sub paths: TTL expiry on read, per-channel fan-out with
//! at-least-once semantics for live subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::store::{BusSubscription, CacheBackend, CacheError};

const TOPIC_BUFFER: usize = 256;

#[derive(Clone, Default)]
pub struct MemoryCache {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

struct Entry {
    value: String,
    expires_at: Instant,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn topic_sender(&self, channel: &str) -> broadcast::Sender<String> {
        let mut topics = self.inner.topics.lock().expect("topics lock");
        topics
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_BUFFER).0)
            .clone()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.inner.entries.lock().expect("entries lock");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.inner.entries.lock().expect("entries lock");
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner
            .entries
            .lock()
            .expect("entries lock")
            .remove(key);
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), CacheError> {
        // A publish with no subscribers is not an error, matching Redis.
        let _ = self.topic_sender(channel).send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn BusSubscription>, CacheError> {
        Ok(Box::new(MemorySubscription {
            receiver: self.topic_sender(channel).subscribe(),
        }))
    }
}

struct MemorySubscription {
    receiver: broadcast::Receiver<String>,
}

#[async_trait]
impl BusSubscription for MemorySubscription {
    async fn next_message(&mut self, wait: Duration) -> Result<Option<String>, CacheError> {
        loop {
            match tokio::time::timeout(wait, self.receiver.recv()).await {
                Ok(Ok(payload)) => return Ok(Some(payload)),
                // Fell behind the ring buffer; skip to the oldest retained.
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(CacheError::SubscriptionClosed);
                }
                Err(_) => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn publish_reaches_live_subscribers() {
        let cache = MemoryCache::new();
        let mut sub = cache.subscribe("stock:alerts").await.unwrap();

        cache.publish("stock:alerts", "{\"x\":1}").await.unwrap();
        let message = sub.next_message(Duration::from_secs(1)).await.unwrap();
        assert_eq!(message.as_deref(), Some("{\"x\":1}"));

        // Quiet channel: bounded wait elapses with no message.
        let quiet = sub.next_message(Duration::from_millis(20)).await.unwrap();
        assert_eq!(quiet, None);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let cache = MemoryCache::new();
        cache.publish("price:updates", "{}").await.unwrap();
    }
}
