//! Device-Side Sync Core
//!
//! Everything that runs on the field device: durable local queue, remote API
//! binding, connectivity tracking and the drain machinery.
//!
//! # Architecture
//!
//! - **`config`** - Layered configuration (defaults, TOML file, environment)
//! - **`error`** - Store, dispatch, sync and queue errors
//! - **`local_db`** - SQLite and in-memory implementations of `MutationStore`
//! - **`offline`** - `MutationQueue`, the entry point for user actions
//! - **`remote_api`** - `RemoteApi` trait and its reqwest binding
//! - **`sync`** - Synchronizer, network monitor, background tags, service loop
//! - **`main`** - `complisite-sync` agent binary (requires the `agent` feature)
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs        - Module exports and documentation
//! ├── main.rs       - Agent entry point
//! ├── config.rs     - Configuration wrapper
//! ├── error.rs      - Error types
//! ├── remote_api.rs - Remote API client
//! ├── local_db/     - Durable mutation store
//! ├── offline/      - Mutation queue
//! └── sync/         - Drain passes and triggers
//! ```

pub mod config;
pub mod error;
pub mod local_db;
pub mod offline;
pub mod remote_api;
pub mod sync;

// Re-export commonly used types
pub use config::Config;
pub use error::{DispatchError, QueueError, StoreError, SyncError};
pub use local_db::{LocalDatabase, MemoryStore, MutationStore};
pub use offline::MutationQueue;
pub use remote_api::{HttpRemoteApi, RemoteApi};
pub use sync::{
    BackgroundSync, DrainOutcome, DrainReport, DrainScope, NetworkMonitor, NetworkStatus,
    SyncService, SyncTag, Synchronizer, WakeHandle,
};
