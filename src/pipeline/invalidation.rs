//! Cache invalidation behavior
//!
//! Removes the cached response associated with a write-style request once
//! the write has completed.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Next, PipelineBehavior};
use crate::cache::CacheStore;
use crate::error::PipelineError;
use crate::models::CacheRemoverRequest;

// == Cache Invalidation Behavior ==
/// Pipeline behavior for [`CacheRemoverRequest`]s.
///
/// The handler always runs first. Removing afterwards means a concurrent
/// reader sees either the old entry or a miss, never a value cached from
/// before the write that outlives it.
pub struct CacheInvalidationBehavior {
    store: Arc<dyn CacheStore>,
}

impl CacheInvalidationBehavior {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<R, Res, E> PipelineBehavior<R, Res, E> for CacheInvalidationBehavior
where
    R: CacheRemoverRequest + Sync,
    Res: Send + 'static,
    E: Send + 'static,
{
    async fn handle(
        &self,
        request: &R,
        next: Next<'_, Res, E>,
        cancel: CancellationToken,
    ) -> Result<Res, PipelineError<E>> {
        if request.bypass_cache() {
            return next.run(cancel).await;
        }

        let response = next.run(cancel.clone()).await?;

        if let Some(key) = request.cache_key() {
            match self.store.remove(key, &cancel).await {
                Ok(()) => debug!("Invalidated cache key {}", key),
                Err(err) => warn!("Failed to invalidate cache key {}: {}", key, err),
            }
        }

        Ok(response)
    }
}
