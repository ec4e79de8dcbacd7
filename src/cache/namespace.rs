//! Key Namespacer Module
//!
//! Maps caller-facing logical keys to the wire keys actually stored, and back.

use tracing::warn;

use crate::cache::SEPARATOR;
use crate::error::{CacheError, Result};
use crate::store::Store;

// == Key Namespacer ==
/// Deterministic mapping between logical keys and wire keys.
///
/// With prefix `app`, logical key `user:1` is stored as `app:user:1`.
/// Without a prefix both forms are identical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyNamespacer {
    prefix: Option<String>,
}

impl KeyNamespacer {
    /// Creates a namespacer. An empty prefix counts as no prefix.
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()),
        }
    }

    /// The configured prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    // == Encode ==
    /// Returns the wire key for a logical key.
    pub fn encode(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}{}", prefix, SEPARATOR, key),
            None => key.to_string(),
        }
    }

    // == Decode ==
    /// Returns the logical key for a wire key.
    ///
    /// Fails with `MalformedKey` when the wire key does not start with the
    /// prefix and separator.
    pub fn decode(&self, wire_key: &str) -> Result<String> {
        let Some(prefix) = &self.prefix else {
            return Ok(wire_key.to_string());
        };

        wire_key
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
            .map(str::to_string)
            .ok_or_else(|| CacheError::MalformedKey(wire_key.to_string()))
    }

    // == Pattern ==
    /// Builds the KEYS pattern selecting `key_prefix` under this namespace.
    ///
    /// Glob metacharacters in the prefix and logical key are escaped so they
    /// match literally; only the trailing wildcard is a glob.
    pub fn pattern(&self, key_prefix: &str, wildcard: bool) -> String {
        let mut pattern = escape_glob(&self.encode(key_prefix));
        if wildcard {
            pattern.push('*');
        }
        pattern
    }

    // == List By Pattern ==
    /// Lists logical keys starting with `key_prefix` (or equal to it when
    /// `wildcard` is false).
    ///
    /// A store failure does not propagate: the result degrades to
    /// `[key_prefix]`, so bulk deletes still attempt the literal key.
    pub async fn list_by_pattern<S>(
        &self,
        store: &S,
        key_prefix: &str,
        wildcard: bool,
    ) -> Vec<String>
    where
        S: Store + ?Sized,
    {
        let pattern = self.pattern(key_prefix, wildcard);
        match store.keys(&pattern).await {
            Ok(wire_keys) => wire_keys
                .iter()
                .filter_map(|wire_key| match self.decode(wire_key) {
                    Ok(key) => Some(key),
                    Err(e) => {
                        warn!("Skipping key outside namespace: {}", e);
                        None
                    }
                })
                .collect(),
            Err(e) => {
                warn!(
                    "Listing keys for pattern {} failed, falling back to {:?}: {}",
                    pattern, key_prefix, e
                );
                vec![key_prefix.to_string()]
            }
        }
    }
}

/// Escapes KEYS glob metacharacters.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn prefixed() -> KeyNamespacer {
        KeyNamespacer::new(Some("app".to_string()))
    }

    #[test]
    fn test_encode_with_prefix() {
        assert_eq!(prefixed().encode("user:1"), "app:user:1");
        assert_eq!(prefixed().encode(""), "app:");
    }

    #[test]
    fn test_encode_without_prefix() {
        let namespacer = KeyNamespacer::new(None);
        assert_eq!(namespacer.encode("user:1"), "user:1");
        assert_eq!(KeyNamespacer::new(Some(String::new())), namespacer);
    }

    #[test]
    fn test_decode() {
        assert_eq!(prefixed().decode("app:user:1").unwrap(), "user:1");
        assert_eq!(prefixed().decode("app:").unwrap(), "");
        assert_eq!(KeyNamespacer::new(None).decode("a").unwrap(), "a");
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(prefixed().decode("ap"), Err(CacheError::MalformedKey(_))));
        assert!(matches!(prefixed().decode("app"), Err(CacheError::MalformedKey(_))));
        assert!(matches!(prefixed().decode("other:key"), Err(CacheError::MalformedKey(_))));
    }

    #[test]
    fn test_pattern() {
        assert_eq!(prefixed().pattern("user", true), "app:user*");
        assert_eq!(prefixed().pattern("user", false), "app:user");
        assert_eq!(prefixed().pattern("", true), "app:*");
        assert_eq!(prefixed().pattern("a*b", false), r"app:a\*b");
    }

    #[tokio::test]
    async fn test_list_by_pattern() {
        let store = MemoryStore::new();
        store.set_ex("app:user:1", b"a", 60).await.unwrap();
        store.set_ex("app:user:2", b"b", 60).await.unwrap();
        store.set_ex("app:post:1", b"c", 60).await.unwrap();
        store.set_ex("other:user:1", b"d", 60).await.unwrap();

        let keys = prefixed().list_by_pattern(&store, "user", true).await;
        assert_eq!(keys, vec!["user:1", "user:2"]);

        let exact = prefixed().list_by_pattern(&store, "user", false).await;
        assert!(exact.is_empty());

        let all = prefixed().list_by_pattern(&store, "", true).await;
        assert_eq!(all.len(), 3);
    }
}
