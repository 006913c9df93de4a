//! # Local Database Module
//!
//! Durable, crash-surviving storage for mutations that have been made on the
//! device but not yet acknowledged by the remote API.
//!
//! ## Architecture
//!
//! - **Queue table**: one row per `QueuedMutation`, ordered by insertion
//! - **Sync metadata**: small key/value table (last successful sync time)
//! - **Schema version**: recorded once per database
//!
//! ## Key Components
//!
//! - `LocalDatabase`: SQLite store used on devices
//! - `MemoryStore`: in-process store with identical semantics
//! - `store.rs`: the `MutationStore` trait both implement
//! - `queue.rs`: queue operations on `LocalDatabase`
//! - `schema.rs`: table definitions and the schema version
//!
//! ## Usage
//!
//! ```rust,no_run
//! use complisite_sync::client::local_db::{LocalDatabase, MutationStore};
//!
//! # async fn example() -> Result<(), complisite_sync::client::error::StoreError> {
//! let db = LocalDatabase::new().await?;
//! let pending = db.count_unsynced().await?;
//! println!("{pending} changes waiting for sync");
//! # Ok(())
//! # }
//! ```

pub mod schema;
pub mod store;
pub mod queue;
pub mod memory;

pub use memory::MemoryStore;
pub use store::MutationStore;

use crate::client::error::StoreError;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How long a writer waits for another connection's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Result type for local database operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Local database connection manager
///
/// Manages the SQLite connection pool backing the mutation queue.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
    /// Maximum unsynced rows; `None` means bounded only by disk
    max_pending: Option<usize>,
}

impl LocalDatabase {
    /// Open or create the queue database at the platform default location
    pub async fn new() -> Result<Self> {
        Self::open(&Self::default_path()).await
    }

    /// Open or create the queue database at `path`
    ///
    /// Uses WAL mode so readers (the pending-count indicator) never block the
    /// synchronizer's writes.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), "opened local mutation queue");
        Self::from_pool(pool).await
    }

    /// Open a private in-memory database
    ///
    /// The pool holds exactly one connection that never expires, since every
    /// SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let db = Self {
            pool,
            max_pending: None,
        };
        db.init_schema().await?;
        Ok(db)
    }

    /// Cap the number of unsynced rows
    pub fn with_capacity(mut self, max_pending: Option<usize>) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn max_pending(&self) -> Option<usize> {
        self.max_pending
    }

    /// Platform-specific path for the queue file
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("complisite");
        path.push("sync-queue.db");
        path
    }

    /// Create tables and record the schema version
    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(schema::SCHEMA_SQL).execute(&self.pool).await?;

        let recorded = sqlx::query(
            "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?, ?)",
        )
        .bind(schema::SCHEMA_VERSION)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        if recorded.rows_affected() > 0 {
            tracing::debug!(version = schema::SCHEMA_VERSION, "recorded queue schema version");
        }
        Ok(())
    }

    /// Current schema version recorded in the database
    pub async fn schema_version(&self) -> Result<i32> {
        let (version,): (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Row counts for diagnostics
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let (pending, synced): (i64, i64) = sqlx::query_as(
            "SELECT
                COALESCE(SUM(CASE WHEN synced = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN synced = 1 THEN 1 ELSE 0 END), 0)
             FROM queued_mutations",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DatabaseStats {
            pending_mutations: pending as u64,
            synced_mutations: synced as u64,
        })
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Rows still waiting for remote acknowledgment
    pub pending_mutations: u64,
    /// Acknowledged rows not yet garbage collected
    pub synced_mutations: u64,
}
