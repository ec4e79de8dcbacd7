//! Store Module
//!
//! Transport capability over a Redis-compatible key-value store, plus the
//! backends implementing it.
//!
//! # Backends
//! - `RedisStore`: network store speaking the Redis protocol
//! - `MemoryStore`: in-process store with the same command semantics

mod entry;
mod memory;
mod pattern;
mod redis_impl;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::Serialize;

use crate::error::Result;

pub use entry::{deadline_after, StoreEntry};
pub use memory::MemoryStore;
pub use pattern::pattern_matches;
pub use redis_impl::{RedisStore, CONNECT_TIMEOUT};

// == Published Message ==
/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedMessage {
    /// Channel the message was published on
    pub channel: String,
    /// Raw payload text
    pub payload: String,
}

impl PublishedMessage {
    /// Creates a new message.
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Stream of messages for one subscription. Ends when the channel closes.
pub type MessageStream = BoxStream<'static, PublishedMessage>;

// == Store Trait ==
/// Commands the cache facade issues against a store.
///
/// Keys are wire keys; namespacing happens above this layer. Every call either
/// returns the store's reply or fails with a `CacheError`.
#[async_trait]
pub trait Store: Send + Sync {
    /// GET: returns the value, or None when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// SET key value EX ttl: overwrites value and TTL.
    async fn set_ex(&self, key: &str, value: &[u8], ttl: u64) -> Result<bool>;

    /// SET key value NX EX ttl: writes only if the key is absent.
    ///
    /// Returns true when the key was created.
    async fn set_nx_ex(&self, key: &str, value: &[u8], ttl: u64) -> Result<bool>;

    /// EXPIRE: replaces the TTL of an existing key, false if absent.
    async fn expire(&self, key: &str, ttl: u64) -> Result<bool>;

    /// DEL: returns true when a key was removed.
    async fn del(&self, key: &str) -> Result<bool>;

    /// EXISTS
    async fn exists(&self, key: &str) -> Result<bool>;

    /// INCRBY: atomically adds `delta` and returns the new value.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// KEYS: all wire keys matching a glob pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// TTL: seconds remaining, -1 without expiry, -2 when absent.
    async fn ttl(&self, key: &str) -> Result<i64>;

    /// PUBLISH a payload to a channel.
    async fn publish(&self, channel: &str, payload: &str) -> Result<()>;

    /// SUBSCRIBE to a channel.
    async fn subscribe(&self, channel: &str) -> Result<MessageStream>;
}
