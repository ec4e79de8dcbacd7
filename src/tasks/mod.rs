//! Background Tasks Module
//!
//! Contains background tasks that run alongside a cache facade.
//!
//! # Tasks
//! - TTL Cleanup: purges expired entries from a `MemoryStore` at a fixed interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
