//! Request Cache demo
//!
//! Wires the caching behaviors around a small in-memory user directory and
//! runs a read / write / read sequence against it.
//!
//! # Startup Sequence
//! 1. Initialize tracing subscriber for logging
//! 2. Load cache settings (fatal when missing) and store tuning
//! 3. Create the in-memory store and start the expiration sweep
//! 4. Build one pipeline for queries and one for commands
//! 5. Run the scenario and log store statistics

use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use request_cache::{
    spawn_cleanup_task, CachableRequest, CacheInvalidationBehavior, CacheReadBehavior,
    CacheRemoverRequest, CacheSettings, CacheStore, MemoryCacheStore, Pipeline, StoreConfig,
};

const USERS_LIST_KEY: &str = "users-list";

#[derive(Error, Debug)]
enum DirectoryError {
    #[error("User already exists: {0}")]
    Duplicate(String),
}

struct ListUsers;

impl CachableRequest for ListUsers {
    fn cache_key(&self) -> &str {
        USERS_LIST_KEY
    }
}

struct AddUser {
    name: String,
}

impl CacheRemoverRequest for AddUser {
    fn cache_key(&self) -> Option<&str> {
        Some(USERS_LIST_KEY)
    }
}

type Directory = Arc<RwLock<Vec<String>>>;

async fn list_users(directory: Directory) -> Result<Vec<String>, DirectoryError> {
    info!("Loading users from the directory");
    Ok(directory.read().await.clone())
}

async fn add_user(directory: Directory, name: String) -> Result<usize, DirectoryError> {
    let mut users = directory.write().await;
    if users.contains(&name) {
        return Err(DirectoryError::Duplicate(name));
    }
    users.push(name);
    Ok(users.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "request_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Arc::new(
        CacheSettings::from_env().context("Cache settings are required at startup")?,
    );
    let config = StoreConfig::from_env();
    info!(
        "Configuration loaded: sliding_expiration={}d, max_entries={}, cleanup_interval={}s",
        settings.sliding_expiration_days, config.max_entries, config.cleanup_interval
    );

    let store = MemoryCacheStore::new(config.max_entries);
    let cleanup_handle = spawn_cleanup_task(store.clone(), config.cleanup_interval);
    let shared: Arc<dyn CacheStore> = Arc::new(store.clone());

    let queries: Pipeline<ListUsers, Vec<String>, DirectoryError> = Pipeline::new()
        .with_behavior(CacheReadBehavior::new(shared.clone(), settings.clone()));
    let commands: Pipeline<AddUser, usize, DirectoryError> =
        Pipeline::new().with_behavior(CacheInvalidationBehavior::new(shared));

    let directory: Directory = Arc::new(RwLock::new(vec!["alice".to_string(), "bob".to_string()]));
    let cancel = CancellationToken::new();

    for attempt in 1..=2 {
        let dir = directory.clone();
        let users = queries
            .send(&ListUsers, cancel.clone(), |_| list_users(dir))
            .await?;
        info!("Read {}: {:?}", attempt, users);
    }

    let request = AddUser {
        name: "carol".to_string(),
    };
    let dir = directory.clone();
    let name = request.name.clone();
    let total = commands
        .send(&request, cancel.clone(), |_| add_user(dir, name))
        .await?;
    info!("Added {}, directory now has {} users", request.name, total);

    let dir = directory.clone();
    let users = queries
        .send(&ListUsers, cancel.clone(), |_| list_users(dir))
        .await?;
    info!("Read after write: {:?}", users);

    let stats = store.stats().await;
    info!(
        "Store stats: hits={}, misses={}, sets={}, removals={}, hit_rate={:.2}",
        stats.hits,
        stats.misses,
        stats.sets,
        stats.removals,
        stats.hit_rate()
    );

    cleanup_handle.abort();
    Ok(())
}
