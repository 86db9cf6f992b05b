//! Pipeline Module
//!
//! A minimal middleware contract for wrapping request handlers.
//!
//! A [`Pipeline`] holds an ordered list of [`PipelineBehavior`]s. Sending a
//! request runs the first behavior with a [`Next`] that continues into the
//! second, and so on until the handler itself runs. Each behavior may return
//! early (a cache hit) or run `next` and act on the result.
//!
//! # Behaviors
//! - [`CacheReadBehavior`] - serves and populates cached responses
//! - [`CacheInvalidationBehavior`] - removes a cached response after a write

mod caching;
mod invalidation;
mod single_flight;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

pub use caching::{CacheReadBehavior, DecodeFailurePolicy};
pub use invalidation::CacheInvalidationBehavior;

/// Future returned by a [`Next`] continuation.
pub type NextFuture<'a, Res, E> =
    Pin<Box<dyn Future<Output = Result<Res, PipelineError<E>>> + Send + 'a>>;

// == Next ==
/// The rest of the pipeline, as seen by one behavior.
///
/// `Next` is consumed by [`Next::run`], so a behavior can continue at most
/// once per request.
pub struct Next<'a, Res, E> {
    continuation: Box<dyn FnOnce(CancellationToken) -> NextFuture<'a, Res, E> + Send + 'a>,
}

impl<'a, Res, E> Next<'a, Res, E>
where
    Res: Send + 'a,
    E: Send + 'a,
{
    /// Wraps a continuation that already speaks [`PipelineError`].
    pub fn new<F>(continuation: F) -> Self
    where
        F: FnOnce(CancellationToken) -> NextFuture<'a, Res, E> + Send + 'a,
    {
        Self {
            continuation: Box::new(continuation),
        }
    }

    /// Wraps the downstream handler. Its errors are carried unchanged in
    /// [`PipelineError::Handler`].
    pub fn from_handler<H, Fut>(handler: H) -> Self
    where
        H: FnOnce(CancellationToken) -> Fut + Send + 'a,
        Fut: Future<Output = Result<Res, E>> + Send + 'a,
    {
        Self::new(move |cancel| {
            Box::pin(async move { handler(cancel).await.map_err(PipelineError::Handler) })
        })
    }

    /// Runs the remaining pipeline.
    pub async fn run(self, cancel: CancellationToken) -> Result<Res, PipelineError<E>> {
        (self.continuation)(cancel).await
    }
}

// == Pipeline Behavior ==
/// One stage wrapped around a handler.
#[async_trait]
pub trait PipelineBehavior<Req, Res, E>: Send + Sync
where
    Req: Sync,
    Res: Send + 'static,
    E: Send + 'static,
{
    async fn handle(
        &self,
        request: &Req,
        next: Next<'_, Res, E>,
        cancel: CancellationToken,
    ) -> Result<Res, PipelineError<E>>;
}

// == Pipeline ==
/// Ordered behaviors for one request type. The first behavior added is the
/// outermost.
pub struct Pipeline<Req, Res, E> {
    behaviors: Vec<Arc<dyn PipelineBehavior<Req, Res, E>>>,
}

impl<Req, Res, E> Pipeline<Req, Res, E>
where
    Req: Sync,
    Res: Send + 'static,
    E: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            behaviors: Vec::new(),
        }
    }

    /// Appends a behavior inside the ones already registered.
    pub fn with_behavior<B>(mut self, behavior: B) -> Self
    where
        B: PipelineBehavior<Req, Res, E> + 'static,
    {
        self.behaviors.push(Arc::new(behavior));
        self
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Runs `request` through every behavior and finally `handler`.
    pub async fn send<H, Fut>(
        &self,
        request: &Req,
        cancel: CancellationToken,
        handler: H,
    ) -> Result<Res, PipelineError<E>>
    where
        H: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = Result<Res, E>> + Send,
    {
        let mut next = Next::from_handler(handler);
        for behavior in self.behaviors.iter().rev() {
            let inner = next;
            next = Next::new(move |cancel| behavior.handle(request, inner, cancel));
        }
        next.run(cancel).await
    }
}

impl<Req, Res, E> Default for Pipeline<Req, Res, E>
where
    Req: Sync,
    Res: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
