//! Integration Tests for the caching pipeline
//!
//! Runs queries and commands through full pipelines backed by the in-memory
//! store, plus stores that fail or record what they are asked to do.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use proptest::prelude::*;
use request_cache::cache::ManualClock;
use request_cache::{
    CachableRequest, CacheError, CacheInvalidationBehavior, CacheReadBehavior,
    CacheRemoverRequest, CacheSettings, CacheStore, MemoryCacheStore, Pipeline, PipelineError,
};
use thiserror::Error;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

const DAY: Duration = Duration::from_secs(86_400);
const HOUR: Duration = Duration::from_secs(3_600);

// == Fixtures ==

#[derive(Error, Debug, PartialEq)]
enum UserError {
    #[error("database offline")]
    Offline,
}

#[derive(Debug, Clone)]
struct ListUsers {
    key: String,
    bypass: bool,
}

impl ListUsers {
    fn new() -> Self {
        Self {
            key: "users-list".to_string(),
            bypass: false,
        }
    }
}

impl CachableRequest for ListUsers {
    fn cache_key(&self) -> &str {
        &self.key
    }

    fn bypass_cache(&self) -> bool {
        self.bypass
    }
}

struct CountUsers;

impl CachableRequest for CountUsers {
    fn cache_key(&self) -> &str {
        "users-list"
    }
}

struct AddUser {
    invalidates: Option<&'static str>,
}

impl CacheRemoverRequest for AddUser {
    fn cache_key(&self) -> Option<&str> {
        self.invalidates
    }
}

type Users = Vec<String>;

fn settings() -> Arc<CacheSettings> {
    Arc::new(CacheSettings::new(1).unwrap())
}

fn queries(store: Arc<dyn CacheStore>) -> Pipeline<ListUsers, Users, UserError> {
    Pipeline::new().with_behavior(CacheReadBehavior::new(store, settings()))
}

fn commands(store: Arc<dyn CacheStore>) -> Pipeline<AddUser, usize, UserError> {
    Pipeline::new().with_behavior(CacheInvalidationBehavior::new(store))
}

/// Counts handler invocations and answers with a fixed user list.
#[derive(Clone, Default)]
struct Directory {
    calls: Arc<AtomicUsize>,
}

impl Directory {
    async fn list(
        &self,
        pipeline: &Pipeline<ListUsers, Users, UserError>,
        request: &ListUsers,
        users: &[&str],
    ) -> Result<Users, PipelineError<UserError>> {
        let calls = self.calls.clone();
        let users: Users = users.iter().map(|u| u.to_string()).collect();
        pipeline
            .send(request, CancellationToken::new(), move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(users)
            })
            .await
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// A store that is never reachable.
struct UnavailableStore;

#[async_trait]
impl CacheStore for UnavailableStore {
    async fn get(&self, _key: &str, _cancel: &CancellationToken) -> Result<Option<Bytes>, CacheError> {
        Err(CacheError::StoreUnavailable("connection refused".to_string()))
    }

    async fn set(
        &self,
        _key: &str,
        _value: Bytes,
        _sliding_expiration: Duration,
        _cancel: &CancellationToken,
    ) -> Result<(), CacheError> {
        Err(CacheError::StoreUnavailable("connection refused".to_string()))
    }

    async fn remove(&self, _key: &str, _cancel: &CancellationToken) -> Result<(), CacheError> {
        Err(CacheError::StoreUnavailable("connection refused".to_string()))
    }
}

/// Delegates to a memory store and logs each call.
struct RecordingStore {
    inner: MemoryCacheStore,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Bytes>, CacheError> {
        self.log.lock().unwrap().push(format!("get {key}"));
        self.inner.get(key, cancel).await
    }

    async fn set(
        &self,
        key: &str,
        value: Bytes,
        sliding_expiration: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), CacheError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("set {key} {}s", sliding_expiration.as_secs()));
        self.inner.set(key, value, sliding_expiration, cancel).await
    }

    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<(), CacheError> {
        self.log.lock().unwrap().push(format!("remove {key}"));
        self.inner.remove(key, cancel).await
    }
}

// == Read Behavior ==

#[tokio::test]
async fn test_users_list_scenario() {
    let store = MemoryCacheStore::new(100);
    let shared: Arc<dyn CacheStore> = Arc::new(store.clone());
    let queries = queries(shared.clone());
    let commands = commands(shared);
    let directory = Directory::default();
    let request = ListUsers::new();

    // Empty store: the handler runs and the response is cached
    let first = assert_ok!(directory.list(&queries, &request, &["alice", "bob"]).await);
    assert_eq!(first, vec!["alice", "bob"]);
    assert_eq!(directory.calls(), 1);
    let ttl = store.ttl_remaining("users-list").await.unwrap();
    assert!(ttl > DAY - Duration::from_secs(60) && ttl <= DAY);

    // Same key: served from cache
    let second = assert_ok!(directory.list(&queries, &request, &["ignored"]).await);
    assert_eq!(second, vec!["alice", "bob"]);
    assert_eq!(directory.calls(), 1);

    // A write invalidates the key
    let added = commands
        .send(
            &AddUser {
                invalidates: Some("users-list"),
            },
            CancellationToken::new(),
            |_| async { Ok(3) },
        )
        .await;
    assert_eq!(assert_ok!(added), 3);

    // Third read recomputes
    let third = assert_ok!(directory.list(&queries, &request, &["alice", "bob", "carol"]).await);
    assert_eq!(third, vec!["alice", "bob", "carol"]);
    assert_eq!(directory.calls(), 2);
}

#[tokio::test]
async fn test_repeated_hits_are_identical() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new(100));
    let queries = queries(store);
    let directory = Directory::default();
    let request = ListUsers::new();

    let original = directory
        .list(&queries, &request, &["alice", "zoë", "\u{1F600}"])
        .await
        .unwrap();
    for _ in 0..5 {
        let cached = directory.list(&queries, &request, &[]).await.unwrap();
        assert_eq!(cached, original);
    }
    assert_eq!(directory.calls(), 1);
}

#[tokio::test]
async fn test_sliding_expiration_is_refreshed_by_hits() {
    let clock = ManualClock::new(0);
    let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::with_clock(100, clock.clone()));
    let queries = queries(store);
    let directory = Directory::default();
    let request = ListUsers::new();

    directory.list(&queries, &request, &["alice"]).await.unwrap();

    clock.advance(20 * HOUR);
    directory.list(&queries, &request, &["bob"]).await.unwrap();

    // 40 hours after the write: past the original day, inside the refreshed one
    clock.advance(20 * HOUR);
    let users = directory.list(&queries, &request, &["bob"]).await.unwrap();
    assert_eq!(users, vec!["alice"]);
    assert_eq!(directory.calls(), 1);

    // A full idle day expires it
    clock.advance(DAY);
    let users = directory.list(&queries, &request, &["bob"]).await.unwrap();
    assert_eq!(users, vec!["bob"]);
    assert_eq!(directory.calls(), 2);
}

#[tokio::test]
async fn test_bypass_does_not_touch_store() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let store: Arc<dyn CacheStore> = Arc::new(RecordingStore {
        inner: MemoryCacheStore::new(100),
        log: log.clone(),
    });
    let queries = queries(store);
    let directory = Directory::default();
    let mut request = ListUsers::new();
    request.bypass = true;

    directory.list(&queries, &request, &["alice"]).await.unwrap();
    directory.list(&queries, &request, &["alice"]).await.unwrap();

    assert_eq!(directory.calls(), 2);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unavailable_store_degrades_to_handler() {
    let store: Arc<dyn CacheStore> = Arc::new(UnavailableStore);
    let queries = queries(store.clone());
    let commands = commands(store);
    let directory = Directory::default();
    let request = ListUsers::new();

    let users = assert_ok!(directory.list(&queries, &request, &["alice"]).await);
    assert_eq!(users, vec!["alice"]);
    assert_ok!(directory.list(&queries, &request, &["alice"]).await);
    assert_eq!(directory.calls(), 2);

    let added = commands
        .send(
            &AddUser {
                invalidates: Some("users-list"),
            },
            CancellationToken::new(),
            |_| async { Ok(1) },
        )
        .await;
    assert_eq!(assert_ok!(added), 1);
}

#[tokio::test]
async fn test_handler_error_passes_through_uncached() {
    let store = MemoryCacheStore::new(100);
    let queries = queries(Arc::new(store.clone()));

    let result = queries
        .send(&ListUsers::new(), CancellationToken::new(), |_| async {
            Err(UserError::Offline)
        })
        .await;

    let err = assert_err!(result);
    assert_eq!(err.to_string(), "database offline");
    assert_eq!(err.into_handler_error(), Some(UserError::Offline));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_incompatible_cached_payload_is_an_error() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new(100));
    let directory = Directory::default();
    directory
        .list(&queries(store.clone()), &ListUsers::new(), &["alice"])
        .await
        .unwrap();

    // Same key, different response type
    let counts: Pipeline<CountUsers, u64, UserError> =
        Pipeline::new().with_behavior(CacheReadBehavior::new(store, settings()));
    let result = counts
        .send(&CountUsers, CancellationToken::new(), |_| async { Ok(1) })
        .await;

    assert!(matches!(result, Err(PipelineError::Decode { .. })));
}

// == Invalidation Behavior ==

#[tokio::test]
async fn test_invalidation_runs_after_handler() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let store: Arc<dyn CacheStore> = Arc::new(RecordingStore {
        inner: MemoryCacheStore::new(100),
        log: log.clone(),
    });
    let commands = commands(store);

    let handler_log = log.clone();
    commands
        .send(
            &AddUser {
                invalidates: Some("users-list"),
            },
            CancellationToken::new(),
            move |_| async move {
                handler_log.lock().unwrap().push("handler".to_string());
                Ok(1)
            },
        )
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["handler", "remove users-list"]);
}

#[tokio::test]
async fn test_invalidation_without_key_leaves_store_alone() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let store: Arc<dyn CacheStore> = Arc::new(RecordingStore {
        inner: MemoryCacheStore::new(100),
        log: log.clone(),
    });
    let commands = commands(store);

    let result = commands
        .send(
            &AddUser { invalidates: None },
            CancellationToken::new(),
            |_| async { Ok(5) },
        )
        .await;

    assert_eq!(result.unwrap(), 5);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_invalidation_still_returns_response() {
    let store = MemoryCacheStore::new(100);
    store
        .set(
            "users-list",
            Bytes::from_static(br#"["alice"]"#),
            HOUR,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let commands = commands(Arc::new(store.clone()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = commands
        .send(
            &AddUser {
                invalidates: Some("users-list"),
            },
            cancel,
            |_| async { Ok(2) },
        )
        .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(store.len().await, 1, "Cancelled removal leaves the entry");
}

// == Combined Pipelines ==

#[tokio::test]
async fn test_request_expiration_reaches_store() {
    struct ShortLived;

    impl CachableRequest for ShortLived {
        fn cache_key(&self) -> &str {
            "short-lived"
        }

        fn sliding_expiration(&self) -> Option<Duration> {
            Some(Duration::from_secs(90))
        }
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    let store: Arc<dyn CacheStore> = Arc::new(RecordingStore {
        inner: MemoryCacheStore::new(100),
        log: log.clone(),
    });
    let pipeline: Pipeline<ShortLived, String, UserError> =
        Pipeline::new().with_behavior(CacheReadBehavior::new(store, settings()));

    pipeline
        .send(&ShortLived, CancellationToken::new(), |_| async {
            Ok("fresh".to_string())
        })
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["get short-lived", "set short-lived 90s"]
    );
}

// == Concurrency ==

async fn concurrent_misses(behavior: CacheReadBehavior) -> usize {
    let pipeline: Pipeline<ListUsers, Users, UserError> = Pipeline::new().with_behavior(behavior);
    let directory = Directory::default();
    let request = ListUsers::new();

    let pipeline = &pipeline;
    let request = &request;
    let slow = move |directory: Directory| async move {
        let calls = directory.calls.clone();
        pipeline
            .send(request, CancellationToken::new(), move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(vec!["alice".to_string()])
            })
            .await
    };

    let (a, b) = tokio::join!(slow(directory.clone()), slow(directory.clone()));
    assert_eq!(a.unwrap(), vec!["alice"]);
    assert_eq!(b.unwrap(), vec!["alice"]);
    directory.calls()
}

#[tokio::test]
async fn test_concurrent_misses_may_both_compute() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new(100));
    let calls = concurrent_misses(CacheReadBehavior::new(store, settings())).await;
    assert_eq!(calls, 2);
}

#[tokio::test]
async fn test_single_flight_computes_once() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new(100));
    let calls =
        concurrent_misses(CacheReadBehavior::new(store, settings()).with_single_flight()).await;
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn test_single_flight_waiter_honours_cancellation() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new(100));
    let pipeline: Pipeline<ListUsers, Users, UserError> =
        Pipeline::new().with_behavior(CacheReadBehavior::new(store, settings()).with_single_flight());
    let request = ListUsers::new();
    let waiter_cancel = CancellationToken::new();

    let holder = pipeline.send(&request, CancellationToken::new(), |_| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(vec!["alice".to_string()])
    });
    let waiter = async {
        // Let the holder take the key lock first
        tokio::time::sleep(Duration::from_millis(10)).await;
        let started = tokio::time::Instant::now();
        let result = pipeline
            .send(&request, waiter_cancel.clone(), |_| async {
                Ok(vec!["bob".to_string()])
            })
            .await;
        (result, started.elapsed())
    };
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        waiter_cancel.cancel();
    };

    let (held, (waited, elapsed), ()) = tokio::join!(holder, waiter, canceller);

    assert_eq!(assert_ok!(held), vec!["alice"]);
    assert!(matches!(assert_err!(waited), PipelineError::Cancelled));
    assert!(
        elapsed < Duration::from_millis(200),
        "Waiter blocked for {:?} after cancellation",
        elapsed
    );
}

// == Properties ==

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Bypassed reads always run the handler once and never reach the store.
    #[test]
    fn prop_bypass_runs_handler_once(
        key in "[a-z-]{1,32}",
        users in prop::collection::vec("[a-z]{1,8}", 0..5),
        repeats in 1usize..5
    ) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let store: Arc<dyn CacheStore> = Arc::new(RecordingStore {
            inner: MemoryCacheStore::new(100),
            log: log.clone(),
        });
        let queries = queries(store);
        let directory = Directory::default();
        let request = ListUsers { key, bypass: true };
        let users: Vec<&str> = users.iter().map(String::as_str).collect();

        for _ in 0..repeats {
            let response = tokio_test::block_on(directory.list(&queries, &request, &users)).unwrap();
            prop_assert_eq!(response, users.clone());
        }
        prop_assert_eq!(directory.calls(), repeats);
        prop_assert!(log.lock().unwrap().is_empty());
    }

    // Without bypass the handler runs once per key, however often it is read.
    #[test]
    fn prop_populated_key_is_served_from_cache(
        key in "[a-z-]{1,32}",
        users in prop::collection::vec("[a-z]{1,8}", 0..5),
        repeats in 2usize..6
    ) {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new(100));
        let queries = queries(store);
        let directory = Directory::default();
        let request = ListUsers { key, bypass: false };
        let users: Vec<&str> = users.iter().map(String::as_str).collect();

        for _ in 0..repeats {
            let response = tokio_test::block_on(directory.list(&queries, &request, &users)).unwrap();
            prop_assert_eq!(response, users.clone());
        }
        prop_assert_eq!(directory.calls(), 1);
    }
}
