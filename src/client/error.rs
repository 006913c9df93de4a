//! Client Error Types
//!
//! Errors raised by the device-side sync core, grouped by the layer that
//! produces them.
//!
//! # Error Types
//!
//! - `StoreError` - the local durable store failed. Fatal for an enqueue;
//!   the caller must tell the user offline capacity is gone.
//! - `DispatchError` - one remote call failed. Always recoverable: the record
//!   stays queued for the next trigger.
//! - `SyncError` - the outcome of a drain pass or background wake that did
//!   not fully succeed.
//! - `QueueError` - why an enqueue was refused.

use crate::client::sync::background::SyncTag;
use crate::shared::SharedError;
use thiserror::Error;

/// SQLite result code for `SQLITE_FULL`
const SQLITE_FULL: &str = "13";

/// Local durable store failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payload could not be encoded for storage
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure while opening the store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device already holds the configured maximum of unsynced records
    #[error("Offline capacity exhausted: {limit} mutations already pending")]
    CapacityExhausted {
        /// Configured limit
        limit: usize,
    },

    /// A stored row could not be decoded
    #[error("Corrupt record {id}: {reason}")]
    CorruptRecord {
        /// Record id
        id: String,
        /// What failed to decode
        reason: String,
    },
}

impl StoreError {
    /// Whether the store ran out of room, either by policy or because the
    /// disk is full
    pub fn is_capacity_exhausted(&self) -> bool {
        match self {
            StoreError::CapacityExhausted { .. } => true,
            StoreError::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some(SQLITE_FULL)
            }
            _ => false,
        }
    }

    pub fn corrupt(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single remote dispatch
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Transport-level failure (DNS, connect, reset)
    #[error("Network error: {message}")]
    Network { message: String },

    /// The remote answered with a non-success status
    #[error("Remote rejected mutation ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The payload could not be prepared locally (e.g. photo file missing)
    #[error("Payload error: {message}")]
    Payload { message: String },
}

impl DispatchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }
}

/// Outcome of a drain pass or wake that did not fully succeed
#[derive(Debug, Error)]
pub enum SyncError {
    /// Some records synced, the rest stay queued
    #[error("Partial sync failure: {synced} synced, {failed} still queued")]
    PartialSyncFailure { synced: usize, failed: usize },

    /// Nothing synced (offline, or every dispatch failed)
    #[error("Total sync failure: {reason}")]
    TotalSyncFailure { reason: String },

    /// The snapshot could not be read from the store
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A wake arrived for a tag nobody registered
    #[error("Background sync tag '{0}' is not registered")]
    TagNotRegistered(SyncTag),

    /// A wake tag string that maps to no known tag
    #[error("Unknown background sync tag '{0}'")]
    UnknownTag(String),

    /// The background sync host loop is gone
    #[error("Background sync host has stopped")]
    BackgroundStopped,

    /// `SyncService::start` called twice
    #[error("Sync service is already running")]
    AlreadyRunning,
}

impl SyncError {
    pub fn total(reason: impl Into<String>) -> Self {
        Self::TotalSyncFailure {
            reason: reason.into(),
        }
    }

    /// Partial and total failures resolve themselves on the next trigger
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::PartialSyncFailure { .. } | SyncError::TotalSyncFailure { .. }
        )
    }
}

/// Why an enqueue was refused
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Invalid(#[from] SharedError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
