//! Cache Store Module
//!
//! The key-value contract the caching behaviors are written against.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::{CacheError, Result};

// == Cache Store Trait ==
/// Shared key-value store with sliding per-entry expiration.
///
/// Implementations must be safe to share across tasks. Every operation takes
/// a cancellation token and returns [`CacheError::Cancelled`] when it fires
/// first. [`CacheError::StoreUnavailable`] marks a transient failure that
/// callers treat as a cache miss.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Looks up a key. `Ok(None)` means the key is absent or expired.
    ///
    /// A hit resets the entry's sliding expiration.
    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Bytes>>;

    /// Stores a payload, overwriting any previous value for the key.
    async fn set(
        &self,
        key: &str,
        value: Bytes,
        sliding_expiration: Duration,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Removes a key. Removing an absent key succeeds.
    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()>;
}

// == Cancellation Guard ==
/// Runs a store operation unless `cancel` fires first.
pub async fn with_cancellation<T, F>(cancel: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(CacheError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CacheError::Cancelled),
        result = operation => result,
    }
}
