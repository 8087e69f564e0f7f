//! Redis-backed cache and bus implementation.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Msg, RedisError};
use tracing::info;

use super::store::{BusSubscription, CacheBackend, CacheError};

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// External Redis server behind a reconnecting connection manager.
///
/// Commands share the managed multiplexed connection; each subscription gets
/// a dedicated pub/sub connection of its own, since a subscribed Redis
/// connection cannot run regular commands.
pub struct RedisCache {
    client: Client,
    connection: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let mut connection = ConnectionManager::new(client.clone()).await?;
        redis::cmd("PING").query_async::<()>(&mut connection).await?;
        info!("redis connection established");
        Ok(Self { client, connection })
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn BusSubscription>, CacheError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        info!(channel, "subscribed to bus channel");
        Ok(Box::new(RedisSubscription {
            messages: Box::pin(pubsub.into_on_message()),
        }))
    }
}

struct RedisSubscription {
    messages: Pin<Box<dyn Stream<Item = Msg> + Send>>,
}

#[async_trait]
impl BusSubscription for RedisSubscription {
    async fn next_message(&mut self, wait: Duration) -> Result<Option<String>, CacheError> {
        match tokio::time::timeout(wait, self.messages.next()).await {
            Ok(Some(msg)) => {
                let payload: String = msg.get_payload()?;
                Ok(Some(payload))
            }
            Ok(None) => Err(CacheError::SubscriptionClosed),
            Err(_) => Ok(None),
        }
    }
}
