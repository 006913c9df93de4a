//! Test fixtures
//!
//! Payload builders, SQLite stores backed by temporary directories and a
//! store wrapper that counts snapshots.

use chrono::{DateTime, Utc};
use complisite_sync::client::error::StoreError;
use complisite_sync::client::local_db::{LocalDatabase, MutationStore};
use complisite_sync::client::remote_api::RemoteApi;
use complisite_sync::client::sync::{NetworkMonitor, NetworkStatus, Synchronizer};
use complisite_sync::shared::{
    ChecklistPayload, CommentPayload, MutationKind, MutationPayload, PhotoPayload,
    QueuedMutation,
};
use futures_util::future::BoxFuture;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub fn checklist_payload(item: &str) -> MutationPayload {
    MutationPayload::Checklist(ChecklistPayload {
        checklist_item_id: item.to_string(),
        completed: true,
        notes: Some("verified on site".to_string()),
        completed_at: Utc::now(),
    })
}

pub fn photo_payload(item: &str) -> MutationPayload {
    MutationPayload::Photo(PhotoPayload::from_path(
        item,
        format!("/data/photos/{}.jpg", item),
    ))
}

pub fn comment_payload(target: &str) -> MutationPayload {
    MutationPayload::Comment(CommentPayload {
        target_id: target.to_string(),
        text: format!("note on {}", target),
        author_id: Some("inspector-1".to_string()),
    })
}

/// SQLite queue in its own temporary directory
pub struct TempStore {
    pub dir: TempDir,
    pub db: LocalDatabase,
}

impl TempStore {
    pub async fn open() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db = LocalDatabase::open(&dir.path().join("queue.db"))
            .await
            .expect("open queue database");
        Self { dir, db }
    }

    /// Cap unsynced rows, as the agent does from `max_pending_mutations`
    pub fn with_capacity(self, limit: usize) -> Self {
        Self {
            dir: self.dir,
            db: self.db.with_capacity(Some(limit)),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("queue.db")
    }

    /// Close the pool and open the same file again, as after a restart
    pub async fn reopen(self) -> Self {
        let path = self.path();
        self.db.close().await;
        let db = LocalDatabase::open(&path).await.expect("reopen queue database");
        Self { dir: self.dir, db }
    }
}

pub fn synchronizer(
    store: Arc<dyn MutationStore>,
    remote: Arc<dyn RemoteApi>,
    status: NetworkStatus,
) -> Arc<Synchronizer> {
    Arc::new(Synchronizer::new(store, remote, NetworkMonitor::new(status)))
}

/// Poll `check` until it returns true, panicking after two seconds
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Forwards to another store, counting how often a snapshot is taken
pub struct CountingStore {
    inner: Arc<dyn MutationStore>,
    snapshots: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn MutationStore>) -> Self {
        Self {
            inner,
            snapshots: AtomicUsize::new(0),
        }
    }

    pub fn snapshots(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }
}

impl MutationStore for CountingStore {
    fn put<'a>(&'a self, record: &'a QueuedMutation) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.put(record)
    }

    fn get_all_unsynced(&self) -> BoxFuture<'_, Result<Vec<QueuedMutation>, StoreError>> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        self.inner.get_all_unsynced()
    }

    fn get_unsynced_by_kind(
        &self,
        kind: MutationKind,
    ) -> BoxFuture<'_, Result<Vec<QueuedMutation>, StoreError>> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        self.inner.get_unsynced_by_kind(kind)
    }

    fn mark_synced<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.mark_synced(id)
    }

    fn record_failure<'a>(
        &'a self,
        id: &'a str,
        error: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.record_failure(id, error)
    }

    fn delete_synced(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        self.inner.delete_synced()
    }

    fn count_unsynced(&self) -> BoxFuture<'_, Result<usize, StoreError>> {
        self.inner.count_unsynced()
    }

    fn set_last_sync_time(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.set_last_sync_time(at)
    }

    fn last_sync_time(&self) -> BoxFuture<'_, Result<Option<DateTime<Utc>>, StoreError>> {
        self.inner.last_sync_time()
    }
}
