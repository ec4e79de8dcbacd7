//! Configuration Module
//!
//! Holds the cache facade settings: store connection, key prefix and default TTL.

use std::env;

/// Default TTL in seconds applied when an operation receives no explicit TTL.
pub const DEFAULT_TTL: u64 = 3600;

/// Default store connection URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Cache facade configuration.
///
/// Fixed at startup and handed to the facade constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Redis connection URL
    pub redis_url: String,
    /// Namespace prefix for every key, None = keys are stored as given
    pub prefix: Option<String>,
    /// Default TTL in seconds for writes without explicit TTL
    pub default_ttl: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - Store connection URL (default: redis://127.0.0.1:6379)
    /// - `CACHE_PREFIX` - Key prefix (default: none; empty counts as none)
    /// - `REDIS_KEY_EXPIRATION` - Default TTL in seconds (default: 3600)
    pub fn from_env() -> Self {
        Self {
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            prefix: env::var("CACHE_PREFIX").ok().filter(|p| !p.is_empty()),
            default_ttl: env::var("REDIS_KEY_EXPIRATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ttl| *ttl > 0)
                .unwrap_or(DEFAULT_TTL),
        }
    }

    /// Replaces the key prefix. An empty prefix disables namespacing.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Replaces the default TTL. Zero is ignored.
    pub fn with_default_ttl(mut self, default_ttl: u64) -> Self {
        if default_ttl > 0 {
            self.default_ttl = default_ttl;
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            prefix: None,
            default_ttl: DEFAULT_TTL,
        }
    }
}
