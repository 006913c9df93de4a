//! CompliSite Sync - Offline-First Write Queue
//!
//! Field staff on construction sites record checklist completions, attach
//! photo evidence and leave comments with little or no connectivity. This
//! library makes those writes durable on the device first and delivers them
//! to the remote API once the network allows.
//!
//! # Module Structure
//!
//! - **`shared`** - Types independent of the device runtime
//!   - Queued mutation records and typed payloads
//!   - Application configuration
//!   - Payload validation errors
//!
//! - **`client`** - Device-side sync core
//!   - Durable SQLite queue (and an in-memory equivalent)
//!   - Remote API binding over reqwest
//!   - Network monitor, drain passes, background wake tags
//!
//! # Feature Flags
//!
//! - **`agent`** - Builds the `complisite-sync` binary with logging setup and
//!   `.env` loading
//!
//! # Delivery Guarantees
//!
//! - Every enqueued mutation is on disk before `enqueue` returns
//! - Records are dispatched in insertion order, one pass at a time
//! - A record is removed only after the remote acknowledged it
//! - Delivery is at least once; the remote must tolerate duplicates
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use complisite_sync::client::{
//!     Config, HttpRemoteApi, LocalDatabase, MutationQueue, NetworkMonitor, NetworkStatus,
//!     Synchronizer,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let db = LocalDatabase::open(&config.database_path()).await?;
//! let remote = HttpRemoteApi::new(config.clone());
//! let monitor = NetworkMonitor::new(NetworkStatus::Offline);
//!
//! let synchronizer = Arc::new(Synchronizer::new(Arc::new(db), Arc::new(remote), monitor));
//! let queue = MutationQueue::new(synchronizer);
//! queue.add_comment("cert-17", "Reinspected, passes", None).await?;
//! # Ok(())
//! # }
//! ```

/// Shared types and data structures
pub mod shared;

/// Device-side sync core
pub mod client;
