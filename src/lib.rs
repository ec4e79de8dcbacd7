//! Redis Helpers - A prefixed cache facade over a Redis-compatible store
//!
//! Provides get/set with default TTLs, prefix-based bulk deletion, atomic
//! counters, read-through caching and pub/sub.

pub mod cache;
pub mod config;
pub mod error;
pub mod store;
pub mod tasks;

pub use cache::{Cache, KeyNamespacer};
pub use config::Config;
pub use error::{CacheError, Result};
pub use store::{MemoryStore, PublishedMessage, RedisStore, Store};
pub use tasks::spawn_cleanup_task;
