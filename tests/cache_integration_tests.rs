//! Integration Tests for the Cache Facade
//!
//! Exercises the public API end to end against the in-memory store and a
//! store whose transport is down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

use redis_helpers::store::MessageStream;
use redis_helpers::{Cache, CacheError, Config, MemoryStore, PublishedMessage, Result, Store};

// == Helper Functions ==

fn test_config() -> Config {
    Config::default().with_prefix("app").with_default_ttl(3600)
}

fn create_test_cache() -> Cache<MemoryStore> {
    Cache::new(MemoryStore::new(), &test_config())
}

/// Store whose every command fails as if the server were unreachable.
struct UnreachableStore;

fn down<T>() -> Result<T> {
    Err(CacheError::Transport("connection refused".to_string()))
}

#[async_trait]
impl Store for UnreachableStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        down()
    }
    async fn set_ex(&self, _key: &str, _value: &[u8], _ttl: u64) -> Result<bool> {
        down()
    }
    async fn set_nx_ex(&self, _key: &str, _value: &[u8], _ttl: u64) -> Result<bool> {
        down()
    }
    async fn expire(&self, _key: &str, _ttl: u64) -> Result<bool> {
        down()
    }
    async fn del(&self, _key: &str) -> Result<bool> {
        down()
    }
    async fn exists(&self, _key: &str) -> Result<bool> {
        down()
    }
    async fn incr_by(&self, _key: &str, _delta: i64) -> Result<i64> {
        down()
    }
    async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
        down()
    }
    async fn ttl(&self, _key: &str) -> Result<i64> {
        down()
    }
    async fn publish(&self, _channel: &str, _payload: &str) -> Result<()> {
        down()
    }
    async fn subscribe(&self, _channel: &str) -> Result<MessageStream> {
        down()
    }
}

// == Degraded Key Listing ==

#[tokio::test]
async fn test_keys_degrades_to_prefix_on_transport_failure() {
    let cache = Cache::new(UnreachableStore, &test_config());

    assert_eq!(cache.keys("user", true).await, vec!["user".to_string()]);
    assert_eq!(cache.keys("", true).await, vec![String::new()]);
}

#[tokio::test]
async fn test_delete_surfaces_transport_failure() {
    let cache = Cache::new(UnreachableStore, &test_config());

    let result = cache.delete(&["user"], true).await;
    assert_eq!(
        assert_err!(result),
        CacheError::Transport("connection refused".to_string())
    );
    assert!(assert_err!(cache.clear().await).is_transport());
}

#[tokio::test]
async fn test_operations_propagate_transport_errors() {
    let cache = Cache::new(UnreachableStore, &test_config());

    assert!(assert_err!(cache.get("k").await).is_transport());
    assert!(assert_err!(cache.set("k", b"v", None).await).is_transport());
    assert!(assert_err!(cache.increment("k", 1, None).await).is_transport());
    assert!(assert_err!(cache.publish("c", "v").await).is_transport());
    assert!(assert_err!(cache.subscribe("c", |_| {}).await).is_transport());
}

// == Key/Value Behavior ==

#[tokio::test]
async fn test_set_then_expire_after_ttl() {
    let cache = create_test_cache();

    assert_ok!(cache.set("short", b"lived", Some(1)).await);
    assert!(assert_ok!(cache.exists("short").await));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(assert_ok!(cache.get("short").await), None);
    assert!(assert_ok!(cache.missing("short").await));
}

#[tokio::test]
async fn test_default_ttl_applies_to_every_write() {
    let cache = create_test_cache();

    cache.set("a", b"1", None).await.unwrap();
    cache.set_if_missing("b", b"2", None).await.unwrap();
    cache.increment("c", 1, None).await.unwrap();
    cache.expire("d", None).await.unwrap();
    cache.set_many([("e", b"5".as_slice())], None).await.unwrap();

    for key in ["a", "b", "c", "d", "e"] {
        assert_eq!(cache.ttl(key).await.unwrap(), 3600, "key {}", key);
    }
}

#[tokio::test]
async fn test_remember_caches_upstream_response() {
    let cache = create_test_cache();
    let counter = AtomicUsize::new(0);
    let fetches = &counter;

    let fetch = move || async move {
        fetches.fetch_add(1, Ordering::SeqCst);
        Ok::<_, CacheError>(br#"[{"name":"card"}]"#.to_vec())
    };

    let first = cache.remember("cards", Some(10), fetch).await.unwrap();
    let second = cache.remember("cards", Some(10), fetch).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(cache.ttl("cards").await.unwrap(), 10);
}

#[tokio::test]
async fn test_concurrent_increments_are_not_lost() {
    let cache = create_test_cache();

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.increment("hits", 1, None).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(cache.get("hits").await.unwrap(), Some(b"20".to_vec()));
}

#[tokio::test]
async fn test_increment_non_integer_value_fails() {
    let cache = create_test_cache();
    cache.set("name", b"alice", None).await.unwrap();

    let result = cache.increment("name", 1, None).await;
    assert!(matches!(result, Err(CacheError::Command(_))));
}

#[tokio::test]
async fn test_clear_without_prefix_empties_store() {
    let cache = Cache::new(MemoryStore::new(), &Config::default());
    cache.set("a", b"1", None).await.unwrap();
    cache.set("b", b"2", None).await.unwrap();

    let deleted = cache.clear().await.unwrap();

    assert_eq!(deleted.len(), 2);
    assert!(cache.store().is_empty().await);
}

#[tokio::test]
async fn test_caches_share_store_across_prefixes() {
    let store = Arc::new(MemoryStore::new());
    let app = Cache::from_shared(Arc::clone(&store), &test_config());
    let other = Cache::from_shared(store, &Config::default().with_prefix("other"));

    app.set("key", b"mine", None).await.unwrap();
    other.set("key", b"theirs", None).await.unwrap();

    app.clear().await.unwrap();

    assert_eq!(app.get("key").await.unwrap(), None);
    assert_eq!(other.get("key").await.unwrap(), Some(b"theirs".to_vec()));
}

#[tokio::test]
async fn test_cache_over_trait_object() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let cache: Cache<dyn Store> = Cache::from_shared(store, &test_config());

    cache.set("key", b"value", None).await.unwrap();
    assert_eq!(cache.keys("", true).await, vec!["key".to_string()]);
}

// == Pub/Sub ==

#[tokio::test]
async fn test_subscribe_receives_published_messages_until_closed() {
    let cache = create_test_cache();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let listener = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .subscribe("updates", move |message| {
                    let _ = tx.send(message);
                })
                .await
        })
    };

    // Wait for the subscription to be registered
    while cache.store().receiver_count("updates").await == 0 {
        tokio::task::yield_now().await;
    }

    cache.publish("updates", &serde_json::json!({"id": 7})).await.unwrap();
    cache.publish("updates", "plain").await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, PublishedMessage::new("updates", r#"{"id":7}"#));
    assert_eq!(second, PublishedMessage::new("updates", "\"plain\""));

    // Closing the channel ends the blocking subscribe call
    assert!(cache.store().close_channel("updates").await);
    let result = tokio::time::timeout(Duration::from_secs(1), listener)
        .await
        .unwrap()
        .unwrap();
    assert_ok!(result);
}

#[tokio::test]
async fn test_channels_are_not_namespaced() {
    let cache = create_test_cache();
    let mut raw = cache.store().subscribe("alerts").await.unwrap();

    cache.publish("alerts", &42).await.unwrap();

    let message = futures_util::StreamExt::next(&mut raw).await.unwrap();
    assert_eq!(message.channel, "alerts");
    assert_eq!(message.payload, "42");
}
