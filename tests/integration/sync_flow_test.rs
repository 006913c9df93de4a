//! End-to-end queue and drain behaviour over a real SQLite file

use crate::common::*;
use assert_matches::assert_matches;
use complisite_sync::client::error::SyncError;
use complisite_sync::client::local_db::MutationStore;
use complisite_sync::client::offline::MutationQueue;
use complisite_sync::client::sync::{
    DrainOutcome, DrainScope, NetworkStatus, SyncConfig, SyncService,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn quiet_config() -> SyncConfig {
    SyncConfig {
        auto_sync: false,
        sync_interval: Duration::from_secs(3600),
        gc_interval: Duration::from_secs(3600),
    }
}

#[tokio::test]
async fn test_offline_checklist_syncs_after_reconnect() {
    let store = TempStore::open().await;
    let remote = Arc::new(ScriptedRemote::new());
    let sync = synchronizer(Arc::new(store.db.clone()), remote.clone(), NetworkStatus::Offline);
    let queue = MutationQueue::new(sync.clone());

    queue.enqueue(checklist_payload("item-1")).await.unwrap();
    assert_eq!(store.db.get_all_unsynced().await.unwrap().len(), 1);
    assert!(remote.calls().is_empty());

    sync.monitor().set_online(true);
    assert_matches!(sync.drain(DrainScope::All).await, Ok(DrainOutcome::Drained(_)));

    assert_eq!(store.db.get_all_unsynced().await.unwrap().len(), 0);
    assert_eq!(remote.targets(), vec!["item-1".to_string()]);
}

#[tokio::test]
async fn test_service_drains_on_reconnect_and_collects_garbage() {
    let store = TempStore::open().await;
    let remote = Arc::new(ScriptedRemote::new());
    let sync = synchronizer(Arc::new(store.db.clone()), remote.clone(), NetworkStatus::Offline);
    let queue = MutationQueue::new(sync.clone());

    queue.record_checklist("item-1", true, None).await.unwrap();
    queue.add_comment("cert-4", "Reinspect Monday", None).await.unwrap();

    let mut service = SyncService::new(quiet_config(), sync.clone());
    service.start().unwrap();
    sync.monitor().set_online(true);

    let db = store.db.clone();
    wait_until(|| {
        let db = db.clone();
        async move { db.count_unsynced().await.unwrap() == 0 }
    })
    .await;

    assert_eq!(store.db.get_stats().await.unwrap().synced_mutations, 2);
    assert_eq!(service.collect_garbage().await.unwrap(), 2);
    assert_eq!(store.db.get_stats().await.unwrap().synced_mutations, 0);
    assert!(store.db.last_sync_time().await.unwrap().is_some());
    service.stop();
}

#[tokio::test]
async fn test_failed_photo_stays_queued_until_remote_recovers() {
    let store = TempStore::open().await;
    let remote = Arc::new(ScriptedRemote::new());
    let sync = synchronizer(Arc::new(store.db.clone()), remote.clone(), NetworkStatus::Offline);
    let queue = MutationQueue::new(sync.clone());

    let first = queue.enqueue(photo_payload("photo-1")).await.unwrap();
    queue.enqueue(photo_payload("photo-2")).await.unwrap();
    remote.fail_target("photo-1");
    sync.monitor().set_online(true);

    let result = sync.drain(DrainScope::All).await;
    assert_matches!(result, Err(SyncError::PartialSyncFailure { synced: 1, failed: 1 }));

    let remaining = store.db.get_all_unsynced().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, first.id);
    assert_eq!(remaining[0].attempts, 1);
    assert!(remaining[0].last_error.as_deref().unwrap_or_default().contains("503"));

    remote.heal_target("photo-1");
    assert_matches!(sync.drain(DrainScope::All).await, Ok(DrainOutcome::Drained(_)));
    assert!(store.db.get_all_unsynced().await.unwrap().is_empty());
    assert_eq!(
        remote.targets(),
        vec!["photo-1".to_string(), "photo-2".to_string(), "photo-1".to_string()]
    );
}

#[tokio::test]
async fn test_back_to_back_drains_take_one_snapshot() {
    let store = TempStore::open().await;
    let counting = Arc::new(CountingStore::new(Arc::new(store.db.clone())));
    let remote = Arc::new(ScriptedRemote::gated());
    let sync = synchronizer(counting.clone(), remote.clone(), NetworkStatus::Online);

    store.db.put(&complisite_sync::shared::QueuedMutation::new(photo_payload("p"))).await.unwrap();

    let first = tokio::spawn({
        let sync = sync.clone();
        async move { sync.drain(DrainScope::All).await }
    });
    remote.gate().entered.notified().await;

    let second = sync.drain(DrainScope::All).await.unwrap();
    assert_eq!(second, DrainOutcome::Skipped);
    assert_eq!(counting.snapshots(), 1);

    remote.gate().release.notify_one();
    assert_matches!(first.await.unwrap(), Ok(DrainOutcome::Drained(_)));
    assert_eq!(counting.snapshots(), 1);
}

#[tokio::test]
async fn test_enqueue_during_pass_waits_for_next_pass() {
    let store = TempStore::open().await;
    let remote = Arc::new(ScriptedRemote::gated());
    let sync = synchronizer(Arc::new(store.db.clone()), remote.clone(), NetworkStatus::Online);

    store
        .db
        .put(&complisite_sync::shared::QueuedMutation::new(checklist_payload("early")))
        .await
        .unwrap();
    let pass = tokio::spawn({
        let sync = sync.clone();
        async move { sync.drain(DrainScope::All).await }
    });
    remote.gate().entered.notified().await;

    let late = complisite_sync::shared::QueuedMutation::new(checklist_payload("late"));
    store.db.put(&late).await.unwrap();
    remote.gate().release.notify_one();

    let report = match pass.await.unwrap() {
        Ok(DrainOutcome::Drained(report)) => report,
        other => panic!("unexpected pass result {:?}", other),
    };
    assert_eq!(report.attempted, 1);
    assert_eq!(remote.targets(), vec!["early".to_string()]);

    let pending = store.db.get_all_unsynced().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, late.id);

    let next = tokio::spawn({
        let sync = sync.clone();
        async move { sync.drain(DrainScope::All).await }
    });
    remote.gate().entered.notified().await;
    remote.gate().release.notify_one();
    assert_matches!(
        next.await.unwrap(),
        Ok(DrainOutcome::Drained(report)) if report.synced == vec![late.id.clone()]
    );
}

#[tokio::test]
async fn test_queue_survives_restart_in_order() {
    let store = TempStore::open().await;
    let mut ids = Vec::new();
    {
        let sync = synchronizer(
            Arc::new(store.db.clone()),
            Arc::new(ScriptedRemote::new()),
            NetworkStatus::Offline,
        );
        let queue = MutationQueue::new(sync);
        for payload in [
            checklist_payload("a"),
            photo_payload("b"),
            comment_payload("c"),
        ] {
            ids.push(queue.enqueue(payload).await.unwrap().id);
        }
    }

    let store = store.reopen().await;
    let restored: Vec<String> = store
        .db
        .get_all_unsynced()
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(restored, ids);
}

#[tokio::test]
async fn test_flaps_and_wakes_never_overlap_passes() {
    use complisite_sync::client::sync::{BackgroundSync, SyncTag};

    let store = TempStore::open().await;
    let remote = Arc::new(ScriptedRemote::new());
    let sync = synchronizer(Arc::new(store.db.clone()), remote.clone(), NetworkStatus::Offline);
    let queue = MutationQueue::new(sync.clone());

    for i in 0..20 {
        let target = format!("item-{}", i);
        let payload = if i % 2 == 0 {
            checklist_payload(&target)
        } else {
            photo_payload(&target)
        };
        queue.enqueue(payload).await.unwrap();
    }

    let mut service = SyncService::new(quiet_config(), sync.clone());
    service.start().unwrap();
    let (mut background, wake) = BackgroundSync::new(sync.clone(), 8);
    for tag in SyncTag::ALL {
        background.register(tag);
    }
    background.spawn();

    for round in 0..25 {
        sync.monitor().set_online(round % 2 == 0);
        wake.try_notify(SyncTag::Photos).unwrap();
        wake.try_notify(SyncTag::Checklists).unwrap();
        tokio::task::yield_now().await;
    }
    sync.monitor().set_online(true);
    let _ = sync.drain(DrainScope::All).await;

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

    assert_eq!(remote.max_in_flight(), 1);
    service.stop();
}
