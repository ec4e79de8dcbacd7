//! Cache Facade Module
//!
//! The public cache operations: namespacing and TTL defaulting on top of a
//! `Store`.
//!
//! Operations are not retried; each one returns the store's reply or its
//! error. Multi-step operations (`expire`, `delete`, `set_many`) are not
//! atomic across steps.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::KeyNamespacer;
use crate::config::Config;
use crate::error::Result;
use crate::store::{PublishedMessage, Store};

// == Cache Facade ==
/// Prefixed key-value cache with TTL management, counters and pub/sub.
///
/// A TTL of `None` (or zero) always means the configured default; the facade
/// never writes a key without expiry.
pub struct Cache<S: ?Sized> {
    /// Store transport
    store: Arc<S>,
    /// Logical/wire key mapping
    namespacer: KeyNamespacer,
    /// Default TTL in seconds
    default_ttl: u64,
}

impl<S: ?Sized> Clone for Cache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            namespacer: self.namespacer.clone(),
            default_ttl: self.default_ttl,
        }
    }
}

impl<S: Store> Cache<S> {
    // == Constructor ==
    /// Creates a facade over `store` using the prefix and default TTL from
    /// `config`.
    pub fn new(store: S, config: &Config) -> Self {
        Self::from_shared(Arc::new(store), config)
    }
}

impl<S: Store + ?Sized> Cache<S> {
    /// Creates a facade over a shared store.
    pub fn from_shared(store: Arc<S>, config: &Config) -> Self {
        Self {
            store,
            namespacer: KeyNamespacer::new(config.prefix.clone()),
            default_ttl: config.default_ttl.max(1),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The key namespacer.
    pub fn namespacer(&self) -> &KeyNamespacer {
        &self.namespacer
    }

    /// Default TTL in seconds.
    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    fn effective_ttl(&self, ttl: Option<u64>) -> u64 {
        ttl.filter(|seconds| *seconds > 0)
            .unwrap_or(self.default_ttl)
    }

    // == Keys ==
    /// Lists logical keys starting with `prefix`, or equal to it when
    /// `wildcard` is false.
    ///
    /// On store failure this returns `[prefix]` instead of an error.
    pub async fn keys(&self, prefix: &str, wildcard: bool) -> Vec<String> {
        self.namespacer
            .list_by_pattern(&*self.store, prefix, wildcard)
            .await
    }

    // == Get ==
    /// Retrieves a value. Absent keys yield `None`, distinct from an empty value.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.store.get(&self.namespacer.encode(key)).await?;
        debug!("GET {} ({})", key, if value.is_some() { "hit" } else { "miss" });
        Ok(value)
    }

    // == Set ==
    /// Stores a value, overwriting any previous value and TTL.
    ///
    /// # Arguments
    /// * `key` - Logical key
    /// * `value` - Pre-serialized payload
    /// * `ttl` - Optional TTL in seconds (uses default_ttl if None)
    pub async fn set(&self, key: &str, value: &[u8], ttl: Option<u64>) -> Result<bool> {
        let ttl = self.effective_ttl(ttl);
        debug!("SET {} ttl={}s", key, ttl);
        self.store
            .set_ex(&self.namespacer.encode(key), value, ttl)
            .await
    }

    // == Set Many ==
    /// Stores every pair with the same TTL and returns the stored values in
    /// input order.
    ///
    /// Pairs already written stay written if a later one fails.
    pub async fn set_many<I, K, V>(&self, pairs: I, ttl: Option<u64>) -> Result<Vec<Vec<u8>>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let mut stored = Vec::new();
        for (key, value) in pairs {
            self.set(key.as_ref(), value.as_ref(), ttl).await?;
            stored.push(value.as_ref().to_vec());
        }
        Ok(stored)
    }

    // == Expire ==
    /// Rewrites a key with a new TTL.
    ///
    /// A missing key is created with an empty value; an existing key is
    /// re-set with its current value. See `touch` for a TTL-only update.
    pub async fn expire(&self, key: &str, ttl: Option<u64>) -> Result<bool> {
        let ttl = self.effective_ttl(ttl);

        if self.missing(key).await? {
            return self.set(key, &[], Some(ttl)).await;
        }

        let current = self.get(key).await?.unwrap_or_default();
        self.set(key, &current, Some(ttl)).await
    }

    // == Touch ==
    /// Updates the TTL of an existing key without rewriting its value.
    ///
    /// Returns false if the key does not exist.
    pub async fn touch(&self, key: &str, ttl: Option<u64>) -> Result<bool> {
        let ttl = self.effective_ttl(ttl);
        self.store.expire(&self.namespacer.encode(key), ttl).await
    }

    // == Delete ==
    /// Deletes keys, returning each matched logical key with whether the store
    /// removed it.
    ///
    /// With `children` set, every input is treated as a prefix and all keys
    /// below it are deleted too; otherwise only exact matches are.
    pub async fn delete<K>(&self, keys: &[K], children: bool) -> Result<BTreeMap<String, bool>>
    where
        K: AsRef<str>,
    {
        let mut deleted = BTreeMap::new();

        for key in keys {
            for matched in self.keys(key.as_ref(), children).await {
                if deleted.contains_key(&matched) {
                    continue;
                }
                let removed = self.store.del(&self.namespacer.encode(&matched)).await?;
                deleted.insert(matched, removed);
            }
        }

        debug!("DEL {} keys", deleted.len());
        Ok(deleted)
    }

    // == Exists / Missing ==
    /// Checks whether a key exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.store.exists(&self.namespacer.encode(key)).await
    }

    /// Checks whether a key is absent.
    ///
    /// Issues its own store query, so under concurrent writes it may disagree
    /// with an earlier `exists`.
    pub async fn missing(&self, key: &str) -> Result<bool> {
        Ok(!self.store.exists(&self.namespacer.encode(key)).await?)
    }

    // == Set If Missing ==
    /// Stores a value only if the key is absent. Returns true when created.
    ///
    /// Uses the store's atomic SET NX, so concurrent callers cannot both win.
    pub async fn set_if_missing(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<u64>,
    ) -> Result<bool> {
        let ttl = self.effective_ttl(ttl);
        let created = self
            .store
            .set_nx_ex(&self.namespacer.encode(key), value, ttl)
            .await?;
        debug!("SETNX {} created={}", key, created);
        Ok(created)
    }

    // == Increment ==
    /// Adds `by` to a counter and returns the new value.
    ///
    /// A missing counter is first created as 0 with the given TTL; an existing
    /// counter keeps its TTL.
    pub async fn increment(&self, key: &str, by: i64, ttl: Option<u64>) -> Result<i64> {
        self.set_if_missing(key, b"0", ttl).await?;
        let value = self.store.incr_by(&self.namespacer.encode(key), by).await?;
        debug!("INCRBY {} {} -> {}", key, by, value);
        Ok(value)
    }

    // == Clear ==
    /// Deletes every key under the configured prefix.
    ///
    /// Without a prefix this deletes every key in the store.
    pub async fn clear(&self) -> Result<BTreeMap<String, bool>> {
        let deleted = self.delete(&[""], true).await?;
        info!("Cleared {} keys", deleted.len());
        Ok(deleted)
    }

    // == Remember ==
    /// Returns the cached value, or runs `producer`, caches its result and
    /// returns it.
    ///
    /// `producer` runs only on a miss; its error is returned without caching.
    pub async fn remember<F, Fut>(
        &self,
        key: &str,
        ttl: Option<u64>,
        producer: F,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let value = producer().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }

    // == TTL ==
    /// Seconds until a key expires: -1 when it never expires, -2 when absent.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        self.store.ttl(&self.namespacer.encode(key)).await
    }

    // == Subscribe ==
    /// Invokes `handler` for every message published on `channel`.
    ///
    /// Does not return until the store closes the subscription. Channels are
    /// not namespaced. Cancel by dropping or aborting the calling task.
    pub async fn subscribe<F>(&self, channel: &str, mut handler: F) -> Result<()>
    where
        F: FnMut(PublishedMessage),
    {
        let mut messages = self.store.subscribe(channel).await?;
        info!("Listening on channel {}", channel);

        while let Some(message) = messages.next().await {
            handler(message);
        }

        info!("Subscription to {} closed", channel);
        Ok(())
    }

    // == Publish ==
    /// Publishes `value` encoded as JSON text.
    pub async fn publish<T>(&self, channel: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(value)?;
        debug!("PUBLISH {} ({} bytes)", channel, payload.len());
        self.store.publish(channel, &payload).await
    }
}
