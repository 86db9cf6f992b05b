//! Request capabilities
//!
//! Traits a request type implements to opt into the caching behaviors.

use std::time::Duration;

// == Cachable Request ==
/// A read-style request whose response can be served from the cache.
///
/// # Example
/// ```
/// use request_cache::CachableRequest;
///
/// struct UsersQuery {
///     page: u32,
///     key: String,
/// }
///
/// impl UsersQuery {
///     fn new(page: u32) -> Self {
///         Self { page, key: format!("users-list:{page}") }
///     }
/// }
///
/// impl CachableRequest for UsersQuery {
///     fn cache_key(&self) -> &str {
///         &self.key
///     }
/// }
///
/// assert_eq!(UsersQuery::new(2).cache_key(), "users-list:2");
/// assert!(!UsersQuery::new(2).bypass_cache());
/// ```
pub trait CachableRequest {
    /// Identifies the cached response for this request's parameters.
    fn cache_key(&self) -> &str;

    /// Skip all cache interaction for this call.
    fn bypass_cache(&self) -> bool {
        false
    }

    /// Per-request sliding expiration; `None` uses the configured default.
    fn sliding_expiration(&self) -> Option<Duration> {
        None
    }
}

// == Cache Remover Request ==
/// A write-style request that invalidates one cached response after it runs.
pub trait CacheRemoverRequest {
    /// Key to remove; `None` leaves the cache untouched.
    fn cache_key(&self) -> Option<&str>;

    /// Skip invalidation for this call.
    fn bypass_cache(&self) -> bool {
        false
    }
}

// == Validation ==
/// Validates a cachable request's key.
///
/// # Returns
/// - `None` if the key is usable
/// - `Some(error_message)` otherwise
pub fn validate_cache_key(key: &str) -> Option<String> {
    if key.trim().is_empty() {
        return Some("Cache key cannot be empty".to_string());
    }
    None
}
