//! In-memory mutation store
//!
//! Same semantics as the SQLite store, including insertion order, upsert in
//! place and the capacity rule. Contents are lost with the process.

use crate::client::error::StoreError;
use crate::client::local_db::store::MutationStore;
use crate::client::local_db::Result;
use crate::shared::{MutationKind, QueuedMutation};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<QueuedMutation>>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    max_pending: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_pending: usize) -> Self {
        Self {
            max_pending: Some(max_pending),
            ..Self::default()
        }
    }

    /// Copy of a record regardless of its sync flag
    pub async fn get(&self, id: &str) -> Option<QueuedMutation> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    /// Total records held, synced or not
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn unsynced_where(&self, filter: impl Fn(&QueuedMutation) -> bool) -> Vec<QueuedMutation> {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| !record.synced && filter(record))
            .cloned()
            .collect()
    }
}

impl MutationStore for MemoryStore {
    fn put<'a>(&'a self, record: &'a QueuedMutation) -> BoxFuture<'a, Result<()>> {
        async move {
            let mut records = self.records.write().await;
            if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
                *existing = record.clone();
                return Ok(());
            }

            if let (Some(limit), false) = (self.max_pending, record.synced) {
                let pending = records.iter().filter(|r| !r.synced).count();
                if pending >= limit {
                    return Err(StoreError::CapacityExhausted { limit });
                }
            }

            records.push(record.clone());
            Ok(())
        }
        .boxed()
    }

    fn get_all_unsynced(&self) -> BoxFuture<'_, Result<Vec<QueuedMutation>>> {
        async move { Ok(self.unsynced_where(|_| true).await) }.boxed()
    }

    fn get_unsynced_by_kind(&self, kind: MutationKind) -> BoxFuture<'_, Result<Vec<QueuedMutation>>> {
        async move { Ok(self.unsynced_where(|r| r.kind() == kind).await) }.boxed()
    }

    fn mark_synced<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            let mut records = self.records.write().await;
            if let Some(record) = records.iter_mut().find(|r| r.id == id) {
                record.synced = true;
            }
            Ok(())
        }
        .boxed()
    }

    fn record_failure<'a>(&'a self, id: &'a str, error: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            let mut records = self.records.write().await;
            if let Some(record) = records.iter_mut().find(|r| r.id == id && !r.synced) {
                record.attempts = record.attempts.saturating_add(1);
                record.last_error = Some(error.to_string());
            }
            Ok(())
        }
        .boxed()
    }

    fn delete_synced(&self) -> BoxFuture<'_, Result<u64>> {
        async move {
            let mut records = self.records.write().await;
            let before = records.len();
            records.retain(|r| !r.synced);
            Ok((before - records.len()) as u64)
        }
        .boxed()
    }

    fn count_unsynced(&self) -> BoxFuture<'_, Result<usize>> {
        async move { Ok(self.records.read().await.iter().filter(|r| !r.synced).count()) }.boxed()
    }

    fn set_last_sync_time(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<()>> {
        async move {
            *self.last_sync.write().await = Some(at);
            Ok(())
        }
        .boxed()
    }

    fn last_sync_time(&self) -> BoxFuture<'_, Result<Option<DateTime<Utc>>>> {
        async move { Ok(*self.last_sync.read().await) }.boxed()
    }
}
