//! # Mutation Queue
//!
//! Entry point for user actions. Each action becomes a `QueuedMutation`
//! that is durably stored before `enqueue` returns, then, if the device is
//! online, a drain is started in the background. The caller never waits on
//! the network.

use crate::client::error::QueueError;
use crate::client::local_db::MutationStore;
use crate::client::sync::{DrainScope, Synchronizer};
use crate::shared::{
    ChecklistPayload, CommentPayload, MutationPayload, PhotoPayload, QueuedMutation,
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MutationQueue {
    synchronizer: Arc<Synchronizer>,
}

impl MutationQueue {
    pub fn new(synchronizer: Arc<Synchronizer>) -> Self {
        Self { synchronizer }
    }

    fn store(&self) -> &Arc<dyn MutationStore> {
        self.synchronizer.store()
    }

    /// Persist a mutation, then kick off a drain if online
    ///
    /// Returns once the record is durable. A `StoreError` here means the
    /// change was NOT saved and the user must be told.
    pub async fn enqueue(&self, payload: MutationPayload) -> Result<QueuedMutation, QueueError> {
        payload.validate()?;

        let record = QueuedMutation::new(payload);
        if let Err(e) = self.store().put(&record).await {
            if e.is_capacity_exhausted() {
                tracing::error!(id = %record.id, error = %e, "offline capacity exhausted, mutation refused");
            } else {
                tracing::error!(id = %record.id, error = %e, "failed to persist mutation");
            }
            return Err(e.into());
        }
        tracing::debug!(id = %record.id, kind = %record.kind(), "mutation queued");

        if self.synchronizer.monitor().is_online() {
            let synchronizer = Arc::clone(&self.synchronizer);
            tokio::spawn(async move {
                // Failures stay queued and are logged by the synchronizer.
                let _ = synchronizer.drain(DrainScope::All).await;
            });
        }

        Ok(record)
    }

    /// Queue a checklist item completion (or un-completion)
    pub async fn record_checklist(
        &self,
        checklist_item_id: impl Into<String>,
        completed: bool,
        notes: Option<String>,
    ) -> Result<QueuedMutation, QueueError> {
        self.enqueue(MutationPayload::Checklist(ChecklistPayload {
            checklist_item_id: checklist_item_id.into(),
            completed,
            notes,
            completed_at: Utc::now(),
        }))
        .await
    }

    /// Queue a photo already saved at `local_path`
    pub async fn attach_photo(
        &self,
        checklist_item_id: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Result<QueuedMutation, QueueError> {
        self.enqueue(MutationPayload::Photo(PhotoPayload::from_path(
            checklist_item_id,
            local_path,
        )))
        .await
    }

    pub async fn add_comment(
        &self,
        target_id: impl Into<String>,
        text: impl Into<String>,
        author_id: Option<String>,
    ) -> Result<QueuedMutation, QueueError> {
        self.enqueue(MutationPayload::Comment(CommentPayload {
            target_id: target_id.into(),
            text: text.into(),
            author_id,
        }))
        .await
    }

    pub async fn pending_count(&self) -> Result<usize, QueueError> {
        Ok(self.store().count_unsynced().await?)
    }
}
