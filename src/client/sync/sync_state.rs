//! # Sync State Management
//!
//! Snapshot of the synchronizer as the UI would show it: whether a pass is
//! running, how many changes are still pending, when the last successful
//! pass finished and what went wrong last.

use crate::client::sync::network_monitor::NetworkStatus;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    pub is_syncing: bool,
    pub last_sync: Option<DateTime<Utc>>,
    /// Fraction of the current pass dispatched (0.0 to 1.0)
    pub progress: f32,
    pub pending_operations: usize,
    pub network_status: NetworkStatus,
    pub last_error: Option<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            is_syncing: false,
            last_sync: None,
            progress: 0.0,
            pending_operations: 0,
            network_status: NetworkStatus::Offline,
            last_error: None,
        }
    }
}

impl SyncState {
    /// Whether the "pending sync" indicator should be shown
    pub fn has_pending(&self) -> bool {
        self.pending_operations > 0
    }
}
