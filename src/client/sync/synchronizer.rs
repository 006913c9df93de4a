//! # Synchronizer
//!
//! Drains unsynced mutations from the local store to the remote API.
//!
//! A drain pass:
//!
//! 1. Returns `Skipped` at once if another pass is running. The request is
//!    dropped, not queued; at most one pass exists process-wide.
//! 2. Fails with `TotalSyncFailure` if the device is offline.
//! 3. Snapshots the unsynced records for its scope. Records enqueued after
//!    this point wait for the next pass.
//! 4. Dispatches each record in snapshot order, marking it synced before
//!    moving on. A failed record is noted and skipped; it never blocks the
//!    records behind it and never rolls back earlier successes.
//!
//! There is no retry inside a pass. The next trigger (reconnect, timer,
//! background wake, enqueue while online) is the retry.
//!
//! Delivery is at least once: a crash between the remote acknowledgment and
//! `mark_synced` resends the record on the next pass.

use crate::client::error::{StoreError, SyncError};
use crate::client::local_db::MutationStore;
use crate::client::remote_api::{dispatch, RemoteApi};
use crate::client::sync::metrics::{PassResult, SyncMetrics};
use crate::client::sync::network_monitor::NetworkMonitor;
use crate::client::sync::sync_state::SyncState;
use crate::shared::{MutationKind, QueuedMutation};
use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Which records a pass covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainScope {
    All,
    Kind(MutationKind),
}

/// What a completed pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Records in the snapshot
    pub attempted: usize,
    /// Ids acknowledged and marked synced, in dispatch order
    pub synced: Vec<String>,
    /// Ids still queued after the pass
    pub failed: Vec<String>,
}

impl DrainReport {
    /// Classify the pass: every record synced, some, or none
    pub fn into_result(self) -> Result<DrainReport, SyncError> {
        match (self.synced.len(), self.failed.len()) {
            (_, 0) => Ok(self),
            (0, failed) => Err(SyncError::total(format!(
                "all {} dispatches failed",
                failed
            ))),
            (synced, failed) => Err(SyncError::PartialSyncFailure { synced, failed }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The pass ran and every snapshot record synced
    Drained(DrainReport),
    /// Another pass was in progress; nothing was read or sent
    Skipped,
}

/// Holds the in-progress flag for the lifetime of one pass
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Synchronizer {
    store: Arc<dyn MutationStore>,
    remote: Arc<dyn RemoteApi>,
    monitor: NetworkMonitor,
    in_progress: AtomicBool,
    state: RwLock<SyncState>,
    metrics: Mutex<SyncMetrics>,
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("monitor", &self.monitor)
            .field("in_progress", &self.in_progress)
            .finish_non_exhaustive()
    }
}

impl Synchronizer {
    pub fn new(
        store: Arc<dyn MutationStore>,
        remote: Arc<dyn RemoteApi>,
        monitor: NetworkMonitor,
    ) -> Self {
        let state = SyncState {
            network_status: monitor.get_status(),
            ..SyncState::default()
        };
        Self {
            store,
            remote,
            monitor,
            in_progress: AtomicBool::new(false),
            state: RwLock::new(state),
            metrics: Mutex::new(SyncMetrics::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn MutationStore> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn RemoteApi> {
        &self.remote
    }

    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }

    /// Whether a pass currently holds the guard
    pub fn is_draining(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Load pending count and last sync time from the store, e.g. at startup
    pub async fn restore_state(&self) -> Result<(), StoreError> {
        let pending = self.store.count_unsynced().await?;
        let last_sync = self.store.last_sync_time().await?;

        let mut state = self.state.write().await;
        state.pending_operations = pending;
        state.last_sync = last_sync;
        state.network_status = self.monitor.get_status();
        Ok(())
    }

    pub async fn status(&self) -> SyncState {
        let mut state = self.state.read().await.clone();
        state.network_status = self.monitor.get_status();
        state
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.metrics.lock().await.clone()
    }

    /// Number of records waiting for the remote
    pub async fn pending_count(&self) -> Result<usize, StoreError> {
        self.store.count_unsynced().await
    }

    /// Run one drain pass over `scope`
    pub async fn drain(&self, scope: DrainScope) -> Result<DrainOutcome, SyncError> {
        let Some(_guard) = DrainGuard::acquire(&self.in_progress) else {
            tracing::debug!(?scope, "drain already in progress, request dropped");
            self.metrics.lock().await.record_skip();
            return Ok(DrainOutcome::Skipped);
        };

        self.begin_pass().await;
        let pass = self.run_pass(scope).await;
        let (synced, failed) = pass
            .as_ref()
            .map(|report| (report.synced.len(), report.failed.len()))
            .unwrap_or((0, 0));
        let result = pass.and_then(DrainReport::into_result);
        self.finish_pass(scope, &result, synced, failed).await;

        result.map(DrainOutcome::Drained)
    }

    async fn begin_pass(&self) {
        self.metrics.lock().await.record_pass_start();
        let mut state = self.state.write().await;
        state.is_syncing = true;
        state.progress = 0.0;
    }

    async fn run_pass(&self, scope: DrainScope) -> Result<DrainReport, SyncError> {
        if !self.monitor.is_online() {
            return Err(SyncError::total("device is offline"));
        }

        let snapshot = match scope {
            DrainScope::All => self.store.get_all_unsynced().await?,
            DrainScope::Kind(kind) => self.store.get_unsynced_by_kind(kind).await?,
        };
        let total = snapshot.len();
        tracing::debug!(?scope, records = total, "drain pass started");

        let mut report = DrainReport {
            attempted: total,
            ..DrainReport::default()
        };
        for (index, record) in snapshot.into_iter().enumerate() {
            if self.dispatch_one(&record).await {
                report.synced.push(record.id);
            } else {
                report.failed.push(record.id);
            }
            self.state.write().await.progress = (index + 1) as f32 / total as f32;
        }

        Ok(report)
    }

    /// Send one record; true once it is marked synced
    async fn dispatch_one(&self, record: &QueuedMutation) -> bool {
        match dispatch(self.remote.as_ref(), &record.payload).await {
            Ok(()) => match self.store.mark_synced(&record.id).await {
                Ok(()) => {
                    tracing::debug!(id = %record.id, kind = %record.kind(), "mutation synced");
                    true
                }
                Err(e) => {
                    tracing::error!(
                        id = %record.id,
                        error = %e,
                        "remote accepted mutation but marking it synced failed; it will be resent"
                    );
                    false
                }
            },
            Err(e) => {
                tracing::warn!(
                    id = %record.id,
                    kind = %record.kind(),
                    attempts = record.attempts + 1,
                    error = %e,
                    "dispatch failed, mutation stays queued"
                );
                if let Err(store_err) = self.store.record_failure(&record.id, &e.to_string()).await {
                    tracing::error!(id = %record.id, error = %store_err, "could not record dispatch failure");
                }
                false
            }
        }
    }

    async fn finish_pass(
        &self,
        scope: DrainScope,
        result: &Result<DrainReport, SyncError>,
        synced: usize,
        failed: usize,
    ) {
        let pending = match self.store.count_unsynced().await {
            Ok(pending) => Some(pending),
            Err(e) => {
                tracing::error!(error = %e, "could not count pending mutations");
                None
            }
        };

        let now = Utc::now();
        match result {
            Ok(_) => {
                tracing::info!(?scope, synced, "drain pass complete");
                if let Err(e) = self.store.set_last_sync_time(now).await {
                    tracing::warn!(error = %e, "could not persist last sync time");
                }
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(?scope, synced, failed, error = %e, "drain pass incomplete, records stay queued");
            }
            Err(e) => {
                tracing::error!(?scope, error = %e, "drain pass aborted");
            }
        }

        {
            let mut state = self.state.write().await;
            state.is_syncing = false;
            state.progress = 1.0;
            state.network_status = self.monitor.get_status();
            if let Some(pending) = pending {
                state.pending_operations = pending;
            }
            match result {
                Ok(_) => {
                    state.last_sync = Some(now);
                    state.last_error = None;
                }
                Err(e) => state.last_error = Some(e.to_string()),
            }
        }

        let pass_result = match result {
            Ok(_) => PassResult::Success,
            Err(SyncError::PartialSyncFailure { .. }) => PassResult::Partial,
            Err(_) => PassResult::Failed,
        };
        self.metrics
            .lock()
            .await
            .record_pass_end(pass_result, synced, failed);
    }
}
