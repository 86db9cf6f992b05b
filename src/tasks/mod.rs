//! Background Tasks Module
//!
//! Contains background tasks that run alongside the caching behaviors.
//!
//! # Tasks
//! - Expiration sweep: removes expired entries from a [`MemoryCacheStore`](crate::MemoryCacheStore)

mod cleanup;

pub use cleanup::spawn_cleanup_task;
