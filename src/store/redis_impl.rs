//! Redis Store Module
//!
//! Store backend speaking the Redis protocol through the `redis` crate.
//!
//! Request/response commands share a `ConnectionManager`, which multiplexes
//! and reconnects on its own; each call works on a cheap clone of it.
//! Subscriptions open a dedicated pub/sub connection that lives as long as
//! the returned stream.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use tracing::{info, warn};

use super::{MessageStream, PublishedMessage, Store};
use crate::error::{CacheError, Result};

/// Upper bound on establishing the initial connection and its PING.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Reconnect attempts the connection manager makes before giving up.
const CONNECT_RETRIES: usize = 1;

// == Redis Store ==
/// Redis-backed store.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connects to a Redis server and verifies it answers PING.
    ///
    /// Fails with a transport error if the server cannot be reached within
    /// `CONNECT_TIMEOUT`.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_timeout(url, CONNECT_TIMEOUT).await
    }

    /// Like `connect`, with an explicit bound on connecting and the first PING.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(CONNECT_RETRIES)
            .set_connection_timeout(timeout);

        let connecting = async move {
            let conn = ConnectionManager::new_with_config(client.clone(), config).await?;
            let store = Self { client, conn };
            store.ping().await?;
            Ok::<_, CacheError>(store)
        };

        let store = tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| {
                CacheError::Transport(format!("connection timed out after {:?}", timeout))
            })??;

        info!("Connected to Redis at {}", url);
        Ok(store)
    }

    /// Round-trips a PING.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl).await?;
        Ok(true)
    }

    async fn set_nx_ex(&self, key: &str, value: &[u8], ttl: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        // Nil reply means the key already existed
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn expire(&self, key: &str, ttl: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let updated: bool = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl)
            .query_async(&mut conn)
            .await?;
        Ok(updated)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, delta).await?;
        Ok(value)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let raw_keys: Vec<Vec<u8>> = conn.keys(pattern).await?;
        Ok(decode_keys(raw_keys))
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.ttl(key).await?;
        Ok(ttl)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _receivers: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        info!("Subscribed to channel {}", channel);

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(payload) => Some(PublishedMessage::new(msg.get_channel_name(), payload)),
                Err(e) => {
                    warn!(
                        "Dropping non-text message on {}: {}",
                        msg.get_channel_name(),
                        e
                    );
                    None
                }
            }
        });

        Ok(stream.boxed())
    }
}

/// Decodes a KEYS reply, skipping keys that are not valid UTF-8.
fn decode_keys(raw_keys: Vec<Vec<u8>>) -> Vec<String> {
    raw_keys
        .into_iter()
        .filter_map(|raw| match String::from_utf8(raw) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(
                    "Skipping non UTF-8 key {}",
                    String::from_utf8_lossy(e.as_bytes())
                );
                None
            }
        })
        .collect()
}
