//! Concurrent writers against the SQLite queue on a multi-threaded runtime

use crate::common::*;
use complisite_sync::client::error::{QueueError, StoreError};
use complisite_sync::client::local_db::MutationStore;
use complisite_sync::client::offline::MutationQueue;
use complisite_sync::client::sync::{DrainScope, NetworkStatus};
use complisite_sync::shared::QueuedMutation;
use pretty_assertions::assert_eq;
use std::sync::Arc;

const WRITERS: usize = 8;
const PUTS_PER_WRITER: usize = 50;

/// Run `WRITERS` tasks that each put `PUTS_PER_WRITER` records at once
async fn concurrent_puts(store: &TempStore) -> Vec<Result<(), StoreError>> {
    let mut tasks = Vec::new();
    for writer in 0..WRITERS {
        let db = store.db.clone();
        tasks.push(tokio::spawn(async move {
            let mut results = Vec::new();
            for n in 0..PUTS_PER_WRITER {
                let target = format!("w{}-{}", writer, n);
                let record = QueuedMutation::new(checklist_payload(&target));
                results.push(db.put(&record).await);
            }
            results
        }));
    }

    let mut results = Vec::new();
    for task in tasks {
        results.extend(task.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_puts_with_capacity_all_land() {
    let store = TempStore::open().await.with_capacity(100_000);

    let results = concurrent_puts(&store).await;
    let errors: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    assert!(errors.is_empty(), "writes failed: {:?}", errors.first());
    assert_eq!(
        store.db.count_unsynced().await.unwrap(),
        WRITERS * PUTS_PER_WRITER
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_puts_stop_exactly_at_capacity() {
    let store = TempStore::open().await.with_capacity(100);

    let results = concurrent_puts(&store).await;
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let unexpected: Vec<_> = results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .filter(|e| !matches!(e, StoreError::CapacityExhausted { limit: 100 }))
        .collect();

    assert!(unexpected.is_empty(), "unexpected errors: {:?}", unexpected.first());
    assert_eq!(accepted, 100);
    assert_eq!(store.db.count_unsynced().await.unwrap(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enqueue_while_drains_mark_synced() {
    let store = TempStore::open().await.with_capacity(10_000);
    let remote = Arc::new(ScriptedRemote::new());
    let sync = synchronizer(Arc::new(store.db.clone()), remote.clone(), NetworkStatus::Online);
    let queue = Arc::new(MutationQueue::new(sync.clone()));

    // Each online enqueue also spawns a drain, so puts race mark_synced.
    let mut tasks = Vec::new();
    for writer in 0..4 {
        let queue = queue.clone();
        tasks.push(tokio::spawn(async move {
            let mut errors: Vec<QueueError> = Vec::new();
            for n in 0..25 {
                let target = format!("w{}-{}", writer, n);
                let payload = if n % 2 == 0 {
                    checklist_payload(&target)
                } else {
                    comment_payload(&target)
                };
                if let Err(e) = queue.enqueue(payload).await {
                    errors.push(e);
                }
            }
            errors
        }));
    }
    for task in tasks {
        let errors = task.await.unwrap();
        assert!(errors.is_empty(), "enqueue failed: {:?}", errors.first());
    }

    let db = store.db.clone();
    let trigger = sync.clone();
    wait_until(|| {
        let db = db.clone();
        let trigger = trigger.clone();
        async move {
            let _ = trigger.drain(DrainScope::All).await;
            db.count_unsynced().await.unwrap() == 0
        }
    })
    .await;

    assert_eq!(store.db.get_stats().await.unwrap().synced_mutations, 100);
    assert_eq!(remote.max_in_flight(), 1);
}
