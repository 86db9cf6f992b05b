//! Expiration Sweep Task
//!
//! Background task that periodically removes expired entries from the
//! in-memory store. Reads already drop expired entries they hit; the sweep
//! reclaims the ones nobody asks for again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryCacheStore;

/// Spawns a task that sweeps expired entries every `cleanup_interval_secs`.
///
/// Returns the task handle; abort it during shutdown.
///
/// # Example
/// ```ignore
/// let store = MemoryCacheStore::new(1000);
/// let cleanup_handle = spawn_cleanup_task(store.clone(), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(store: MemoryCacheStore, cleanup_interval_secs: u64) -> JoinHandle<()> {
    // A zero interval would spin
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiration sweep with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.cleanup_expired().await;
            if removed > 0 {
                info!("Expiration sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiration sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, ManualClock};
    use bytes::Bytes;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let clock = ManualClock::new(0);
        let store = MemoryCacheStore::with_clock(100, clock.clone());
        let cancel = CancellationToken::new();

        store
            .set("short", Bytes::from_static(b"v"), Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        store
            .set("long", Bytes::from_static(b"v"), Duration::from_secs(3600), &cancel)
            .await
            .unwrap();

        clock.advance(Duration::from_secs(10));
        let handle = spawn_cleanup_task(store.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.len().await, 1, "Only the live entry should remain");
        assert!(store.ttl_remaining("long").await.is_some());

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(MemoryCacheStore::new(100), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
