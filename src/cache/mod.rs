//! Cache Module
//!
//! Prefixed key-value cache facade over a Redis-compatible store.

mod facade;
mod namespace;


// Re-export public types
pub use facade::Cache;
pub use namespace::KeyNamespacer;

// == Public Constants ==
/// Separator between the namespace prefix and the logical key
pub const SEPARATOR: char = ':';
