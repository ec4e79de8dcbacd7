//! In-memory Store Module
//!
//! HashMap-backed store with lazy TTL expiration and broadcast pub/sub.
//!
//! Mirrors the command semantics of a Redis server closely enough for the
//! facade to behave identically on either backend:
//! - expired entries are invisible to every command and dropped on write
//! - INCRBY keeps the existing TTL and rejects non-integer values
//! - TTL replies -2 for missing keys and -1 for keys without expiry

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use super::{
    deadline_after, pattern_matches, MessageStream, PublishedMessage, Store, StoreEntry,
};
use crate::error::{CacheError, Result};

/// Buffered messages per channel before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 100;

// == Memory Store ==
/// In-process store implementing the Redis command subset used by the facade.
///
/// Cloning is cheap and clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Key-value storage
    entries: Arc<RwLock<HashMap<String, StoreEntry>>>,
    /// Pub/sub channels by name
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<PublishedMessage>>>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Length ==
    /// Returns the number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|entry| !entry.is_expired()).count()
    }

    /// Returns true if the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // == Purge Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Number of active subscribers on a channel.
    pub async fn receiver_count(&self, channel: &str) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Closes a channel. Subscriptions on it end once buffered messages drain.
    pub async fn close_channel(&self, channel: &str) -> bool {
        let mut channels = self.channels.write().await;
        channels.remove(channel).is_some()
    }

    /// Number of channels with a registered sender.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    // == Purge Idle Channels ==
    /// Drops channels that no subscriber listens on anymore.
    ///
    /// Returns the number of channels removed.
    pub async fn purge_idle_channels(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        before - channels.len()
    }

    /// Subscribes to a channel, creating its sender on first use.
    ///
    /// The receiver is taken while the lock is held; pruning only removes
    /// senders without receivers.
    async fn receiver(&self, channel: &str) -> broadcast::Receiver<PublishedMessage> {
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(channel) {
                return sender.subscribe();
            }
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Removes a channel if its last subscriber has gone.
    async fn prune_channel(&self, channel: &str) {
        let mut channels = self.channels.write().await;
        if channels
            .get(channel)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(channel);
            debug!("Dropped idle channel {}", channel);
        }
    }
}

/// Converts a TTL to a deadline, rejecting TTLs too large to represent the
/// way the server rejects an invalid expire time.
fn expiry_deadline(ttl: u64, command: &str) -> Result<Instant> {
    deadline_after(ttl).ok_or_else(|| {
        CacheError::Command(format!("invalid expire time in '{}' command", command))
    })
}

/// Returns the live entry for `key`, dropping it first if it has expired.
fn live_entry<'a>(
    entries: &'a mut HashMap<String, StoreEntry>,
    key: &str,
) -> Option<&'a mut StoreEntry> {
    if entries.get(key).is_some_and(StoreEntry::is_expired) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: u64) -> Result<bool> {
        let deadline = expiry_deadline(ttl, "setex")?;
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), StoreEntry::new(value.to_vec(), Some(deadline)));
        Ok(true)
    }

    async fn set_nx_ex(&self, key: &str, value: &[u8], ttl: u64) -> Result<bool> {
        let deadline = expiry_deadline(ttl, "set")?;
        let mut entries = self.entries.write().await;
        if live_entry(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(key.to_string(), StoreEntry::new(value.to_vec(), Some(deadline)));
        Ok(true)
    }

    async fn expire(&self, key: &str, ttl: u64) -> Result<bool> {
        let deadline = expiry_deadline(ttl, "expire")?;
        let mut entries = self.entries.write().await;
        match live_entry(&mut entries, key) {
            Some(entry) => {
                entry.expire_at(deadline);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(key)
            .is_some_and(|entry| !entry.is_expired()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).is_some_and(|entry| !entry.is_expired()))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut entries = self.entries.write().await;
        match live_entry(&mut entries, key) {
            Some(entry) => {
                let current = entry.as_integer().ok_or_else(|| {
                    CacheError::Command("value is not an integer or out of range".to_string())
                })?;
                let next = current.checked_add(delta).ok_or_else(|| {
                    CacheError::Command("increment or decrement would overflow".to_string())
                })?;
                entry.value = next.to_string().into_bytes();
                Ok(next)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    StoreEntry::new(delta.to_string().into_bytes(), None),
                );
                Ok(delta)
            }
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired() && pattern_matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let entries = self.entries.read().await;
        let ttl = match entries.get(key).filter(|entry| !entry.is_expired()) {
            None => -2,
            Some(entry) => entry
                .ttl_remaining()
                .map_or(-1, |seconds| seconds as i64),
        };
        Ok(ttl)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let idle = {
            let channels = self.channels.read().await;
            match channels.get(channel) {
                Some(sender) => {
                    // No receivers is not an error, the message is simply dropped
                    let delivered = sender
                        .send(PublishedMessage::new(channel, payload))
                        .unwrap_or(0);
                    debug!("Published to {} ({} receivers)", channel, delivered);
                    delivered == 0
                }
                None => false,
            }
        };

        if idle {
            self.prune_channel(channel).await;
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream> {
        let receiver = self.receiver(channel).await;
        let channel = channel.to_string();

        let stream = futures_util::stream::unfold(receiver, move |mut receiver| {
            let channel = channel.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(message) => return Some((message, receiver)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Subscriber on {} lagged, {} messages dropped", channel, skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}
