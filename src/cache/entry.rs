//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with sliding expiration.

use std::time::Duration;

use bytes::Bytes;

// == Cache Entry ==
/// A stored payload and its expiration metadata.
///
/// Expiration is sliding: the deadline is measured from the last access, and
/// every successful read moves it forward by the full sliding duration.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored payload
    pub value: Bytes,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last write or successful read (Unix milliseconds)
    pub last_accessed_at: u64,
    /// How long the entry lives without being read
    pub sliding_expiration: Duration,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry written at `now_ms`.
    pub fn new(value: Bytes, sliding_expiration: Duration, now_ms: u64) -> Self {
        Self {
            value,
            created_at: now_ms,
            last_accessed_at: now_ms,
            sliding_expiration,
        }
    }

    // == Expires At ==
    /// Current expiration deadline (Unix milliseconds).
    pub fn expires_at(&self) -> u64 {
        self.last_accessed_at
            .saturating_add(duration_ms(self.sliding_expiration))
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// Boundary condition: the entry is expired once `now_ms` reaches the
    /// deadline, so a fully elapsed window never yields a hit.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at()
    }

    // == Touch ==
    /// Records a read at `now_ms`, resetting the sliding window.
    pub fn touch(&mut self, now_ms: u64) {
        self.last_accessed_at = now_ms;
    }

    /// Milliseconds since the entry was written; reads do not reset it.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at)
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds; zero once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at().saturating_sub(now_ms)
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
