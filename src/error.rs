//! Error types for the request cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised by a cache store operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The backing store could not be reached or failed transiently
    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(String),

    /// The operation was cancelled before it completed
    #[error("Cache operation cancelled")]
    Cancelled,

    /// Invalid key, payload or expiration
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cache is full and eviction failed
    #[error("Cache full: {0}")]
    CacheFull(String),
}

// == Codec Error Enum ==
/// Errors raised while converting a response to or from its cached payload.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode cached payload: {0}")]
    Decode(#[source] serde_json::Error),
}

// == Config Error Enum ==
/// Startup configuration errors. Any of these is fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required setting was not provided
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// A setting was provided but could not be used
    #[error("Invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },

    /// The configuration document is not valid JSON
    #[error("Malformed configuration document: {0}")]
    Json(#[from] serde_json::Error),
}

// == Pipeline Error Enum ==
/// Error returned from a pipeline run.
///
/// Handler errors are carried untouched in [`PipelineError::Handler`]; the
/// remaining variants are raised by the caching behaviors themselves.
#[derive(Error, Debug)]
pub enum PipelineError<E> {
    /// The downstream handler failed
    #[error(transparent)]
    Handler(E),

    /// A cached payload could not be decoded into the response type
    #[error("Cached payload for key {key:?} could not be decoded")]
    Decode {
        key: String,
        #[source]
        source: CodecError,
    },

    /// The request was cancelled before a response could be produced
    #[error("Request cancelled")]
    Cancelled,

    /// The request cannot be cached as described
    #[error("Invalid cache request: {0}")]
    InvalidRequest(String),
}

impl<E> PipelineError<E> {
    /// Returns the handler error, if this is one.
    pub fn into_handler_error(self) -> Option<E> {
        match self {
            PipelineError::Handler(err) => Some(err),
            _ => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache store operations.
pub type Result<T> = std::result::Result<T, CacheError>;
