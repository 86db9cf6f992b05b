//! Request capabilities for the caching behaviors
//!
//! A request type opts into caching by implementing one of these traits.

pub mod requests;

// Re-export commonly used items
pub use requests::{validate_cache_key, CachableRequest, CacheRemoverRequest};
