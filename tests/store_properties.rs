//! Behavioural properties of the record store, exercised through the async
//! `TodoStore` over a file-backed pool.

mod common;

use common::test_store;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use todo_service::storage::{ConnectionPool, PoolConfig};
use todo_service::{ErrorKind, TodoError, TodoPatch, TodoStore};

#[tokio::test]
async fn buy_milk_scenario() {
    let (store, _dir) = test_store().await;

    let created = store.create("buy milk", false).await.unwrap();
    assert_eq!(created.id, 1);
    assert!(!created.completed);

    let updated = store
        .update(1, TodoPatch::default().completed(true))
        .await
        .unwrap();
    assert_eq!(updated.title, "buy milk");
    assert!(updated.completed);

    assert_eq!(store.get(1).await.unwrap(), updated);

    store.delete(1).await.unwrap();
    let err = store.get(1).await.unwrap_err();
    assert!(matches!(err, TodoError::NotFound { id: 1 }));
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let (store, _dir) = test_store().await;

    for (title, completed) in [("write tests", false), ("ship it", true), ("ünïcødé ✓", false)] {
        let created = store.create(title, completed).await.unwrap();
        assert_eq!(created.title, title);
        assert_eq!(created.completed, completed);
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(store.get(created.id).await.unwrap(), created);
    }
}

#[tokio::test]
async fn partial_updates_touch_only_supplied_fields() {
    let (store, _dir) = test_store().await;
    let original = store.create("draft", false).await.unwrap();

    let retitled = store
        .update(original.id, TodoPatch::default().title("final"))
        .await
        .unwrap();
    assert_eq!(retitled.title, "final");
    assert!(!retitled.completed);
    assert_eq!(retitled.created_at, original.created_at);
    assert!(retitled.updated_at > original.updated_at);

    let completed = store
        .update(original.id, TodoPatch::default().completed(true))
        .await
        .unwrap();
    assert_eq!(completed.title, "final");
    assert!(completed.completed);
    assert_eq!(completed.created_at, original.created_at);
    assert!(completed.updated_at > retitled.updated_at);
}

#[tokio::test]
async fn updated_at_strictly_increases_on_rapid_updates() {
    let (store, _dir) = test_store().await;
    let todo = store.create("flip", false).await.unwrap();

    let mut last = todo.updated_at;
    for i in 0..20 {
        let updated = store
            .update(todo.id, TodoPatch::default().completed(i % 2 == 0))
            .await
            .unwrap();
        assert!(updated.updated_at > last, "update {i} did not advance updated_at");
        assert!(updated.updated_at >= updated.created_at);
        last = updated.updated_at;
    }
}

#[tokio::test]
async fn not_found_is_uniform() {
    let (store, _dir) = test_store().await;
    let deleted = store.create("gone", false).await.unwrap();
    store.delete(deleted.id).await.unwrap();

    for id in [deleted.id, 999] {
        let get = store.get(id).await.unwrap_err();
        let update = store
            .update(id, TodoPatch::default().completed(true))
            .await
            .unwrap_err();
        let delete = store.delete(id).await.unwrap_err();
        for err in [get, update, delete] {
            assert!(matches!(err, TodoError::NotFound { id: missing } if missing == id));
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }
}

#[tokio::test]
async fn failed_update_mutates_nothing() {
    let (store, _dir) = test_store().await;
    let kept = store.create("keep me", false).await.unwrap();

    assert!(
        store
            .update(kept.id + 1, TodoPatch::default().title("intruder"))
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert_eq!(store.list().await.unwrap(), vec![kept]);
}

#[tokio::test]
async fn second_delete_is_not_found() {
    let (store, _dir) = test_store().await;
    let todo = store.create("once", false).await.unwrap();

    store.delete(todo.id).await.unwrap();
    assert!(store.delete(todo.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn list_is_ordered_by_id_under_interleaved_updates() {
    let (store, _dir) = test_store().await;
    assert!(store.list().await.unwrap().is_empty());

    let mut ids = Vec::new();
    for title in ["a", "b", "c", "d"] {
        ids.push(store.create(title, false).await.unwrap().id);
    }
    // Touch them in reverse so updated_at order disagrees with id order.
    for id in ids.iter().rev() {
        store
            .update(*id, TodoPatch::default().completed(true))
            .await
            .unwrap();
    }
    store.delete(ids[1]).await.unwrap();

    let listed: Vec<i64> = store.list().await.unwrap().iter().map(|t| t.id).collect();
    assert_eq!(listed, vec![ids[0], ids[2], ids[3]]);
}

#[tokio::test]
async fn concurrent_creates_get_distinct_ids() {
    let (store, _dir) = test_store().await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.create(format!("task {i}"), false).await.unwrap().id
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 16);
    assert_eq!(store.list().await.unwrap().len(), 16);
}

#[tokio::test]
async fn rejected_input_never_opens_a_connection() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let pool = ConnectionPool::with_opener(PoolConfig::default(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        rusqlite::Connection::open_in_memory()
    });
    let store = TodoStore::new(pool);

    let empty = store.update(1, TodoPatch::default()).await.unwrap_err();
    assert!(matches!(empty, TodoError::EmptyPatch));
    let blank = store.create(" \t ", true).await.unwrap_err();
    assert_eq!(blank.kind(), ErrorKind::Validation);

    assert_eq!(attempts.load(Ordering::SeqCst), 0);
}
