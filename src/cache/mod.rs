//! Cache Module
//!
//! The store contract used by the caching behaviors and an in-memory
//! implementation with sliding expiration and LRU eviction.

mod clock;
mod entry;
mod lru;
mod memory;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use memory::MemoryCacheStore;
pub use stats::CacheStats;
pub use store::{with_cancellation, CacheStore};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
