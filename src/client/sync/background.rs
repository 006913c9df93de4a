//! # Background Sync Tags
//!
//! The host platform can wake the app while it is not in the foreground and
//! ask it to flush one category of pending work. Each category is named by a
//! tag string; a wake for a registered tag runs a drain restricted to that
//! tag's mutation kind.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use complisite_sync::client::sync::{BackgroundSync, SyncTag, Synchronizer};
//! # async fn example(synchronizer: Arc<Synchronizer>) -> Result<(), complisite_sync::client::error::SyncError> {
//! let (mut background, wake) = BackgroundSync::new(synchronizer, 16);
//! background.register(SyncTag::Photos);
//! background.spawn();
//!
//! // Later, when the platform delivers a wake:
//! let outcome = wake.wake_str("sync-photos").await?;
//! # Ok(())
//! # }
//! ```
//!
//! Wakes are processed one at a time. A wake that lands while another pass
//! is running gets `DrainOutcome::Skipped`, same as any other trigger.
//!
//! On Unix the agent's host is the process supervisor: `spawn_signal_wakes`
//! maps `SIGUSR1` to `sync-checklists` and `SIGUSR2` to `sync-photos`.

use crate::client::error::SyncError;
use crate::client::sync::synchronizer::{DrainOutcome, DrainScope, Synchronizer};
use crate::shared::MutationKind;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Background wake tags understood by the sync core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTag {
    Checklists,
    Photos,
}

impl SyncTag {
    pub const ALL: [SyncTag; 2] = [SyncTag::Checklists, SyncTag::Photos];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTag::Checklists => "sync-checklists",
            SyncTag::Photos => "sync-photos",
        }
    }

    /// The mutation kind this tag flushes
    pub fn kind(&self) -> MutationKind {
        match self {
            SyncTag::Checklists => MutationKind::Checklist,
            SyncTag::Photos => MutationKind::Photo,
        }
    }
}

impl fmt::Display for SyncTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncTag {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| SyncError::UnknownTag(s.to_string()))
    }
}

type WakeReply = oneshot::Sender<Result<DrainOutcome, SyncError>>;

#[derive(Debug)]
struct WakeMessage {
    tag: SyncTag,
    reply: Option<WakeReply>,
}

/// Cloneable handle the platform glue uses to deliver wakes
#[derive(Debug, Clone)]
pub struct WakeHandle {
    tx: mpsc::Sender<WakeMessage>,
}

impl WakeHandle {
    /// Deliver a wake and wait for the pass it triggered
    pub async fn wake(&self, tag: SyncTag) -> Result<DrainOutcome, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WakeMessage {
                tag,
                reply: Some(reply),
            })
            .await
            .map_err(|_| SyncError::BackgroundStopped)?;
        rx.await.map_err(|_| SyncError::BackgroundStopped)?
    }

    /// Deliver a wake named by its platform tag string
    pub async fn wake_str(&self, tag: &str) -> Result<DrainOutcome, SyncError> {
        self.wake(tag.parse()?).await
    }

    /// Deliver a wake without waiting for its result
    ///
    /// A full channel already holds a pending wake, so the new one is dropped.
    pub fn try_notify(&self, tag: SyncTag) -> Result<(), SyncError> {
        match self.tx.try_send(WakeMessage { tag, reply: None }) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(%tag, "wake channel full, wake coalesced");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SyncError::BackgroundStopped),
        }
    }
}

/// Host loop that turns wakes into scoped drains
#[derive(Debug)]
pub struct BackgroundSync {
    synchronizer: Arc<Synchronizer>,
    registered: HashSet<SyncTag>,
    rx: mpsc::Receiver<WakeMessage>,
}

impl BackgroundSync {
    pub fn new(synchronizer: Arc<Synchronizer>, capacity: usize) -> (Self, WakeHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let background = Self {
            synchronizer,
            registered: HashSet::new(),
            rx,
        };
        (background, WakeHandle { tx })
    }

    /// Ask the platform to deliver wakes for `tag`
    pub fn register(&mut self, tag: SyncTag) {
        if self.registered.insert(tag) {
            tracing::info!(%tag, "background sync registered");
        }
    }

    pub fn unregister(&mut self, tag: SyncTag) {
        if self.registered.remove(&tag) {
            tracing::info!(%tag, "background sync unregistered");
        }
    }

    pub fn is_registered(&self, tag: SyncTag) -> bool {
        self.registered.contains(&tag)
    }

    /// Run the drain for one wake
    pub async fn handle(&self, tag: SyncTag) -> Result<DrainOutcome, SyncError> {
        if !self.is_registered(tag) {
            tracing::warn!(%tag, "wake for unregistered tag ignored");
            return Err(SyncError::TagNotRegistered(tag));
        }

        tracing::debug!(%tag, "background wake");
        self.synchronizer.drain(DrainScope::Kind(tag.kind())).await
    }

    /// Process wakes until every `WakeHandle` is dropped
    pub async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            let result = self.handle(message.tag).await;
            match message.reply {
                Some(reply) => {
                    // The waiter may have given up; nothing to do then.
                    let _ = reply.send(result);
                }
                None => {
                    if let Err(e) = result {
                        tracing::debug!(tag = %message.tag, error = %e, "background wake finished with error");
                    }
                }
            }
        }
        tracing::info!("background sync host stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Deliver wakes from Unix signals: `SIGUSR1` flushes checklists and
/// `SIGUSR2` flushes photos.
///
/// Both handlers are installed before this returns, so a signal sent after
/// the call is never taken by the default action.
#[cfg(unix)]
pub fn spawn_signal_wakes(wake: WakeHandle) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut checklists = signal(SignalKind::user_defined1())?;
    let mut photos = signal(SignalKind::user_defined2())?;

    Ok(tokio::spawn(async move {
        loop {
            let tag = tokio::select! {
                Some(()) = checklists.recv() => SyncTag::Checklists,
                Some(()) = photos.recv() => SyncTag::Photos,
                else => break,
            };
            tracing::debug!(%tag, "wake signal received");
            if wake.try_notify(tag).is_err() {
                break;
            }
        }
        tracing::info!("signal wakes stopped");
    }))
}
