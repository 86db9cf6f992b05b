//! Request Cache - caching behaviors for request pipelines
//!
//! Serves read-style requests from a shared cache with sliding expiration and
//! invalidates entries after write-style requests complete.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod tasks;

pub use cache::{CacheStore, MemoryCacheStore};
pub use codec::{Codec, JsonCodec};
pub use config::{CacheSettings, StoreConfig};
pub use error::{CacheError, CodecError, ConfigError, PipelineError};
pub use models::{CachableRequest, CacheRemoverRequest};
pub use pipeline::{
    CacheInvalidationBehavior, CacheReadBehavior, DecodeFailurePolicy, Next, Pipeline,
    PipelineBehavior,
};
pub use tasks::spawn_cleanup_task;
