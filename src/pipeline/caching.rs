//! Cache read behavior
//!
//! Serves read-style requests from the cache and populates it on a miss.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::single_flight::KeyedLocks;
use super::{Next, PipelineBehavior};
use crate::cache::CacheStore;
use crate::codec::{Codec, JsonCodec};
use crate::config::CacheSettings;
use crate::error::{CacheError, PipelineError};
use crate::models::{validate_cache_key, CachableRequest};

// == Decode Failure Policy ==
/// What to do when a cached payload cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeFailurePolicy {
    /// Return [`PipelineError::Decode`] to the caller.
    #[default]
    Fail,
    /// Log the failure, run the handler and overwrite the entry.
    Recompute,
}

// == Cache Read Behavior ==
/// Pipeline behavior for [`CachableRequest`]s.
///
/// # Flow
/// 1. Bypassed requests go straight to the handler; the store is not touched
/// 2. A live entry is decoded and returned without running the handler
/// 3. On a miss the handler runs and its response is stored with the request's
///    sliding expiration, or the configured default
///
/// Store failures on lookup count as a miss, and store or encode failures while
/// populating are logged; neither fails the request. A cancelled lookup does.
pub struct CacheReadBehavior<C = JsonCodec> {
    store: Arc<dyn CacheStore>,
    settings: Arc<CacheSettings>,
    codec: C,
    decode_policy: DecodeFailurePolicy,
    single_flight: Option<KeyedLocks>,
}

impl CacheReadBehavior<JsonCodec> {
    // == Constructor ==
    /// Creates a behavior using JSON payloads and the `Fail` decode policy.
    pub fn new(store: Arc<dyn CacheStore>, settings: Arc<CacheSettings>) -> Self {
        Self {
            store,
            settings,
            codec: JsonCodec,
            decode_policy: DecodeFailurePolicy::default(),
            single_flight: None,
        }
    }
}

impl<C: Codec> CacheReadBehavior<C> {
    /// Replaces the payload codec.
    pub fn with_codec<C2: Codec>(self, codec: C2) -> CacheReadBehavior<C2> {
        CacheReadBehavior {
            store: self.store,
            settings: self.settings,
            codec,
            decode_policy: self.decode_policy,
            single_flight: self.single_flight,
        }
    }

    pub fn with_decode_policy(mut self, policy: DecodeFailurePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    /// Lets only one caller at a time run the handler for a given key.
    ///
    /// Callers that waited re-check the store before running the handler
    /// themselves.
    pub fn with_single_flight(mut self) -> Self {
        self.single_flight = Some(KeyedLocks::new());
        self
    }

    pub fn decode_policy(&self) -> DecodeFailurePolicy {
        self.decode_policy
    }

    /// Returns the cached response for `key`, if there is a usable one.
    async fn lookup<Res, E>(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Res>, PipelineError<E>>
    where
        Res: DeserializeOwned,
    {
        let payload = match self.store.get(key, cancel).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("Cache miss for key {}", key);
                return Ok(None);
            }
            Err(CacheError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(err) => {
                warn!("Cache lookup for key {} failed, treating as miss: {}", key, err);
                return Ok(None);
            }
        };

        match self.codec.decode::<Res>(&payload) {
            Ok(response) => {
                debug!("Cache hit for key {}", key);
                Ok(Some(response))
            }
            Err(source) => match self.decode_policy {
                DecodeFailurePolicy::Fail => Err(PipelineError::Decode {
                    key: key.to_string(),
                    source,
                }),
                DecodeFailurePolicy::Recompute => {
                    warn!(
                        "Discarding undecodable cache entry for key {}: {}",
                        key, source
                    );
                    Ok(None)
                }
            },
        }
    }

    /// Runs the handler and stores its response.
    async fn populate<R, Res, E>(
        &self,
        request: &R,
        next: Next<'_, Res, E>,
        cancel: CancellationToken,
    ) -> Result<Res, PipelineError<E>>
    where
        R: CachableRequest,
        Res: Serialize + Send + 'static,
        E: Send + 'static,
    {
        let response = next.run(cancel.clone()).await?;

        let key = request.cache_key();
        let sliding_expiration = request
            .sliding_expiration()
            .unwrap_or_else(|| self.settings.sliding_expiration_default());

        match self.codec.encode(&response) {
            Ok(payload) => {
                match self
                    .store
                    .set(key, payload, sliding_expiration, &cancel)
                    .await
                {
                    Ok(()) => debug!(
                        "Cached response for key {} (sliding expiration {:?})",
                        key, sliding_expiration
                    ),
                    Err(err) => warn!("Failed to cache response for key {}: {}", key, err),
                }
            }
            Err(err) => warn!("Failed to encode response for key {}: {}", key, err),
        }

        Ok(response)
    }
}

#[async_trait]
impl<R, Res, E, C> PipelineBehavior<R, Res, E> for CacheReadBehavior<C>
where
    R: CachableRequest + Sync,
    Res: Serialize + DeserializeOwned + Send + 'static,
    E: Send + 'static,
    C: Codec + 'static,
{
    async fn handle(
        &self,
        request: &R,
        next: Next<'_, Res, E>,
        cancel: CancellationToken,
    ) -> Result<Res, PipelineError<E>> {
        if request.bypass_cache() {
            debug!("Cache bypassed for key {}", request.cache_key());
            return next.run(cancel).await;
        }

        let key = request.cache_key();
        if let Some(error_msg) = validate_cache_key(key) {
            return Err(PipelineError::InvalidRequest(error_msg));
        }

        if let Some(response) = self.lookup::<Res, E>(key, &cancel).await? {
            return Ok(response);
        }

        match &self.single_flight {
            Some(locks) => {
                let _guard = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    guard = locks.acquire(key) => guard,
                };
                // Another caller may have populated the key while we waited
                if let Some(response) = self.lookup::<Res, E>(key, &cancel).await? {
                    return Ok(response);
                }
                self.populate(request, next, cancel).await
            }
            None => self.populate(request, next, cancel).await,
        }
    }
}
