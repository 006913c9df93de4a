//! # Sync Service
//!
//! Moves queued mutations from the device to the remote API.
//!
//! ## Architecture
//!
//! - **Synchronizer**: one drain pass at a time over the local store
//! - **Network Monitor**: online/offline state and edge events
//! - **Background**: platform wake tags mapped to scoped drains
//! - **Sync State**: what the UI shows (pending count, last sync, errors)
//! - **Metrics**: cumulative pass counters
//!
//! `SyncService` ties these together: it drains when connectivity returns,
//! drains on a timer while online and periodically deletes records the
//! remote already acknowledged.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! use complisite_sync::client::sync::{SyncConfig, SyncService, Synchronizer};
//!
//! # async fn example(synchronizer: Arc<Synchronizer>) -> Result<(), complisite_sync::client::error::SyncError> {
//! let mut service = SyncService::new(SyncConfig::default(), synchronizer);
//! service.start()?;
//!
//! let status = service.status().await;
//! println!("{} changes pending", status.pending_operations);
//!
//! service.force_sync().await?;
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod metrics;
pub mod network_monitor;
pub mod sync_state;
pub mod synchronizer;

pub use background::{BackgroundSync, SyncTag, WakeHandle};
pub use metrics::{PassResult, SyncMetrics};
pub use network_monitor::{ConnectivityEvent, ConnectivityEvents, NetworkMonitor, NetworkStatus};
pub use sync_state::SyncState;
pub use synchronizer::{DrainOutcome, DrainReport, DrainScope, Synchronizer};

use crate::client::config::Config;
use crate::client::error::{StoreError, SyncError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Longest timer period the loop will schedule; longer intervals are clamped
/// so deadline arithmetic cannot overflow.
const MAX_TIMER_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Configuration for the sync service
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Drain on a timer while online
    pub auto_sync: bool,
    pub sync_interval: Duration,
    /// How often acknowledged records are deleted
    pub gc_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval: Duration::from_secs(30),
            gc_interval: Duration::from_secs(3600),
        }
    }
}

impl From<&Config> for SyncConfig {
    fn from(config: &Config) -> Self {
        Self {
            auto_sync: true,
            sync_interval: config.sync_interval(),
            gc_interval: config.gc_interval(),
        }
    }
}

/// Main sync service coordinator
#[derive(Debug)]
pub struct SyncService {
    config: SyncConfig,
    synchronizer: Arc<Synchronizer>,
    background_task: Option<JoinHandle<()>>,
}

impl SyncService {
    pub fn new(config: SyncConfig, synchronizer: Arc<Synchronizer>) -> Self {
        Self {
            config,
            synchronizer,
            background_task: None,
        }
    }

    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.synchronizer
    }

    /// Start the trigger loop
    pub fn start(&mut self) -> Result<(), SyncError> {
        if self.background_task.is_some() {
            return Err(SyncError::AlreadyRunning);
        }

        // Subscribe before spawning so no transition is missed.
        let events = self.synchronizer.monitor().events();
        let synchronizer = Arc::clone(&self.synchronizer);
        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            Self::run_loop(synchronizer, events, config).await;
        });
        self.background_task = Some(handle);

        tracing::info!(
            sync_interval = ?self.config.sync_interval,
            gc_interval = ?self.config.gc_interval,
            "sync service started"
        );
        Ok(())
    }

    /// Stop the trigger loop. A pass already running is abandoned at its
    /// next await point; unacknowledged records simply stay queued.
    pub fn stop(&mut self) {
        if let Some(handle) = self.background_task.take() {
            handle.abort();
            tracing::info!("sync service stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.background_task
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Drain everything now, regardless of the timer
    pub async fn force_sync(&self) -> Result<DrainOutcome, SyncError> {
        self.synchronizer.drain(DrainScope::All).await
    }

    /// Delete acknowledged records now
    pub async fn collect_garbage(&self) -> Result<u64, StoreError> {
        collect_garbage(&self.synchronizer).await
    }

    pub async fn status(&self) -> SyncState {
        self.synchronizer.status().await
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.synchronizer.metrics().await
    }

    async fn run_loop(
        synchronizer: Arc<Synchronizer>,
        mut events: ConnectivityEvents,
        config: SyncConfig,
    ) {
        let sync_period = config.sync_interval.min(MAX_TIMER_PERIOD);
        let gc_period = config.gc_interval.min(MAX_TIMER_PERIOD);

        let mut sync_tick = tokio::time::interval(sync_period);
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First collection one full interval after start.
        let mut gc_tick = tokio::time::interval_at(Instant::now() + gc_period, gc_period);
        gc_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(ConnectivityEvent::BecameOnline) => {
                        drain_logged(&synchronizer, "reconnect").await;
                    }
                    Some(ConnectivityEvent::BecameOffline) => {
                        tracing::debug!("offline, waiting for reconnect");
                    }
                    None => break,
                },
                _ = sync_tick.tick(), if config.auto_sync => {
                    if synchronizer.monitor().is_online() {
                        drain_logged(&synchronizer, "interval").await;
                    }
                }
                _ = gc_tick.tick() => {
                    if let Err(e) = collect_garbage(&synchronizer).await {
                        tracing::error!(error = %e, "garbage collection failed");
                    }
                }
            }
        }
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        if let Some(handle) = self.background_task.take() {
            handle.abort();
        }
    }
}

async fn drain_logged(synchronizer: &Synchronizer, trigger: &'static str) {
    match synchronizer.drain(DrainScope::All).await {
        Ok(DrainOutcome::Drained(report)) => {
            tracing::debug!(trigger, synced = report.synced.len(), "triggered drain finished");
        }
        Ok(DrainOutcome::Skipped) => {
            tracing::debug!(trigger, "triggered drain skipped, pass already running");
        }
        // The synchronizer already logged the failure.
        Err(e) => tracing::debug!(trigger, error = %e, "triggered drain incomplete"),
    }
}

async fn collect_garbage(synchronizer: &Synchronizer) -> Result<u64, StoreError> {
    let deleted = synchronizer.store().delete_synced().await?;
    if deleted > 0 {
        tracing::info!(deleted, "removed acknowledged mutations");
    }
    Ok(deleted)
}
