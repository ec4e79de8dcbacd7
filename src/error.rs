//! Error types for the cache facade
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Store unreachable, connection dropped or timed out
    #[error("Transport error: {0}")]
    Transport(String),

    /// Store rejected the command (wrong type, non-integer value, ...)
    #[error("Command failed: {0}")]
    Command(String),

    /// Wire key does not carry the configured prefix
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// Payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    /// Returns true for failures of the store connection itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, CacheError::Transport(_))
    }
}

// == Redis Error Mapping ==
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal()
            || err.is_timeout()
            || err.is_connection_dropped()
            || err.is_io_error()
        {
            CacheError::Transport(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display() {
        let error = CacheError::Transport("connection refused".to_string());
        assert_eq!(error.to_string(), "Transport error: connection refused");
        assert!(error.is_transport());
    }

    #[test]
    fn test_malformed_key_display() {
        let error = CacheError::MalformedKey("ab".to_string());
        assert_eq!(error.to_string(), "Malformed key: ab");
        assert!(!error.is_transport());
    }

    #[test]
    fn test_redis_io_error_maps_to_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error: CacheError = redis::RedisError::from(io).into();
        assert!(error.is_transport());
    }

    #[test]
    fn test_redis_type_error_maps_to_command() {
        let err = redis::RedisError::from((redis::ErrorKind::TypeError, "not an integer"));
        let error: CacheError = err.into();
        assert!(matches!(error, CacheError::Command(_)));
    }

    #[test]
    fn test_serde_error_maps_to_serialization() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let error: CacheError = err.into();
        assert!(matches!(error, CacheError::Serialization(_)));
    }
}
