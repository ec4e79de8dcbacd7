//! Store Entry Module
//!
//! Defines the structure for values held by the in-memory store.

use std::time::{Duration, Instant};

// == Store Entry ==
/// A stored value with an optional expiration deadline.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    /// The stored value
    pub value: Vec<u8>,
    /// Expiration deadline, None = no expiration
    pub expires_at: Option<Instant>,
}

/// Returns the instant `ttl_seconds` from now.
///
/// None when the deadline is too far out for `Instant` to represent.
pub fn deadline_after(ttl_seconds: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(ttl_seconds))
}

impl StoreEntry {
    // == Constructor ==
    /// Creates a new entry with an optional expiration deadline.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `expires_at` - Deadline, see `deadline_after`
    pub fn new(value: Vec<u8>, expires_at: Option<Instant>) -> Self {
        Self { value, expires_at }
    }

    /// Replaces the expiration deadline.
    pub fn expire_at(&mut self, deadline: Instant) {
        self.expires_at = Some(deadline);
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its deadline.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at.map(|deadline| {
            deadline
                .saturating_duration_since(Instant::now())
                .as_millis() as u64
        })
    }

    /// Returns remaining TTL in whole seconds, rounded to nearest, the way
    /// the TTL command reports it.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.ttl_remaining_ms().map(|ms| (ms + 500) / 1000)
    }

    /// Parses the value as a signed integer counter.
    pub fn as_integer(&self) -> Option<i64> {
        std::str::from_utf8(&self.value).ok()?.parse().ok()
    }
}
