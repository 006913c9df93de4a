//! # Mutation Store
//!
//! The contract every local durable store implements. The synchronizer and
//! the queue manager only see this trait, so the SQLite store used on
//! devices and the in-memory store used by tests and ephemeral hosts are
//! interchangeable.
//!
//! Methods return boxed futures so the trait stays object safe and the
//! futures stay `Send` for `tokio::spawn`.

use crate::client::error::StoreError;
use crate::shared::{MutationKind, QueuedMutation};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;

/// Durable, device-scoped storage for queued mutations, keyed by id
pub trait MutationStore: Send + Sync {
    /// Insert or replace a record by id
    fn put<'a>(&'a self, record: &'a QueuedMutation) -> BoxFuture<'a, Result<(), StoreError>>;

    /// All unsynced records in insertion order
    fn get_all_unsynced(&self) -> BoxFuture<'_, Result<Vec<QueuedMutation>, StoreError>>;

    /// Unsynced records of one kind, in insertion order
    fn get_unsynced_by_kind(
        &self,
        kind: MutationKind,
    ) -> BoxFuture<'_, Result<Vec<QueuedMutation>, StoreError>>;

    /// Flag a record as acknowledged. Missing or already synced ids are a no-op.
    fn mark_synced<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Note a failed dispatch on an unsynced record. Missing ids are a no-op.
    fn record_failure<'a>(
        &'a self,
        id: &'a str,
        error: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Remove every synced record, returning how many were removed
    fn delete_synced(&self) -> BoxFuture<'_, Result<u64, StoreError>>;

    fn count_unsynced(&self) -> BoxFuture<'_, Result<usize, StoreError>>;

    /// Persist the completion time of the last fully successful drain
    fn set_last_sync_time(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<(), StoreError>>;

    fn last_sync_time(&self) -> BoxFuture<'_, Result<Option<DateTime<Utc>>, StoreError>>;
}
