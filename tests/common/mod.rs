#![allow(dead_code)]

use axum::Router;
use std::sync::Once;
use std::time::Duration;
use tempfile::TempDir;
use todo_service::TodoStore;
use todo_service::http::build_router;
use todo_service::storage::{ConnectionPool, PoolConfig};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        todo_service::logging::init_test_logging();
    });
}

/// A store over a fresh file database with the schema in place.
///
/// The `TempDir` must outlive the store.
pub async fn test_store() -> (TodoStore, TempDir) {
    test_store_with(PoolConfig::default()).await
}

pub async fn test_store_with(config: PoolConfig) -> (TodoStore, TempDir) {
    init_test_logging();
    let dir = TempDir::new().expect("Failed to create temp dir");
    let pool = ConnectionPool::open(dir.path().join("todos.db"), config);
    let store = TodoStore::new(pool);
    store.ensure_schema().await.expect("Failed to create schema");
    (store, dir)
}

pub async fn test_app() -> (Router, TodoStore, TempDir) {
    let (store, dir) = test_store().await;
    let router = build_router(store.clone(), Duration::from_secs(5));
    (router, store, dir)
}
