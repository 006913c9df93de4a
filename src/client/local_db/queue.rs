//! # Mutation Queue Storage
//!
//! SQLite implementation of `MutationStore`.
//!
//! ## Features
//!
//! - **Ordered queue**: rows are read back in insertion order (`seq`)
//! - **Upsert by id**: replacing a record keeps its position in the queue
//! - **Idempotent flags**: marking synced twice, or a missing id, is a no-op
//! - **Capacity guard**: new rows are refused once the unsynced limit is hit;
//!   nothing is ever evicted to make room
//! - **Cleanup**: only synced rows are removed
//!
//! Rows that cannot be decoded are logged and skipped, never deleted, so a
//! later build that understands them can still send them.

use crate::client::error::StoreError;
use crate::client::local_db::store::MutationStore;
use crate::client::local_db::{LocalDatabase, Result};
use crate::shared::{MutationKind, MutationPayload, QueuedMutation};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const LAST_SYNC_TIME_KEY: &str = "last_sync_time";

const UPSERT_SQL: &str = "
    INSERT INTO queued_mutations (id, kind, payload, created_at, synced, attempts, last_error)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        kind = excluded.kind,
        payload = excluded.payload,
        created_at = excluded.created_at,
        synced = excluded.synced,
        attempts = excluded.attempts,
        last_error = excluded.last_error";

/// Inserts only while the unsynced count is under the limit. Replacing an
/// existing id always goes through.
const BOUNDED_UPSERT_SQL: &str = "
    INSERT INTO queued_mutations (id, kind, payload, created_at, synced, attempts, last_error)
    SELECT ?, ?, ?, ?, ?, ?, ?
    WHERE EXISTS (SELECT 1 FROM queued_mutations WHERE id = ?)
       OR (SELECT COUNT(*) FROM queued_mutations WHERE synced = 0) < ?
    ON CONFLICT(id) DO UPDATE SET
        kind = excluded.kind,
        payload = excluded.payload,
        created_at = excluded.created_at,
        synced = excluded.synced,
        attempts = excluded.attempts,
        last_error = excluded.last_error";

impl LocalDatabase {
    /// Set sync metadata
    pub async fn set_sync_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata (key, value, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Get sync metadata
    pub async fn get_sync_metadata(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM sync_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    /// Look up a single record regardless of its sync flag
    pub async fn get_mutation(&self, id: &str) -> Result<Option<QueuedMutation>> {
        let row = sqlx::query(
            "SELECT id, kind, payload, created_at, synced, attempts, last_error
             FROM queued_mutations
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| decode_row(&row)).transpose()
    }

    async fn insert_or_replace(&self, record: &QueuedMutation) -> Result<()> {
        let payload = serde_json::to_string(&record.payload)?;
        let limit = self.max_pending().filter(|_| !record.synced);

        // Capacity check and write are one statement, so they share SQLite's
        // write lock and concurrent writers wait on the busy timeout.
        let sql = if limit.is_some() { BOUNDED_UPSERT_SQL } else { UPSERT_SQL };
        let mut query = sqlx::query(sql)
            .bind(&record.id)
            .bind(record.kind().as_str())
            .bind(&payload)
            .bind(record.created_at.to_rfc3339())
            .bind(record.synced)
            .bind(i64::from(record.attempts))
            .bind(&record.last_error);
        if let Some(limit) = limit {
            query = query
                .bind(&record.id)
                .bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let result = query.execute(self.pool()).await?;
        match limit {
            Some(limit) if result.rows_affected() == 0 => {
                Err(StoreError::CapacityExhausted { limit })
            }
            _ => Ok(()),
        }
    }

    async fn fetch_unsynced(&self, kind: Option<MutationKind>) -> Result<Vec<QueuedMutation>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query(
                    "SELECT id, kind, payload, created_at, synced, attempts, last_error
                     FROM queued_mutations
                     WHERE synced = 0 AND kind = ?
                     ORDER BY seq ASC",
                )
                .bind(kind.as_str())
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, kind, payload, created_at, synced, attempts, last_error
                     FROM queued_mutations
                     WHERE synced = 0
                     ORDER BY seq ASC",
                )
                .fetch_all(self.pool())
                .await?
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match decode_row(&row) {
                Ok(record) => records.push(record),
                Err(err) => tracing::error!(error = %err, "skipping undecodable queued mutation"),
            }
        }
        Ok(records)
    }
}

fn decode_row(row: &SqliteRow) -> Result<QueuedMutation> {
    let id: String = row.try_get("id")?;
    let kind: String = row.try_get("kind")?;
    let payload: String = row.try_get("payload")?;
    let created_at: String = row.try_get("created_at")?;
    let synced: bool = row.try_get("synced")?;
    let attempts: i64 = row.try_get("attempts")?;
    let last_error: Option<String> = row.try_get("last_error")?;

    let payload: MutationPayload = serde_json::from_str(&payload)
        .map_err(|e| StoreError::corrupt(&id, format!("payload: {}", e)))?;
    if payload.kind().as_str() != kind {
        return Err(StoreError::corrupt(
            &id,
            format!("kind column '{}' does not match payload", kind),
        ));
    }
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::corrupt(&id, format!("created_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(QueuedMutation {
        id,
        payload,
        created_at,
        synced,
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        last_error,
    })
}

impl MutationStore for LocalDatabase {
    fn put<'a>(&'a self, record: &'a QueuedMutation) -> BoxFuture<'a, Result<()>> {
        self.insert_or_replace(record).boxed()
    }

    fn get_all_unsynced(&self) -> BoxFuture<'_, Result<Vec<QueuedMutation>>> {
        self.fetch_unsynced(None).boxed()
    }

    fn get_unsynced_by_kind(&self, kind: MutationKind) -> BoxFuture<'_, Result<Vec<QueuedMutation>>> {
        self.fetch_unsynced(Some(kind)).boxed()
    }

    fn mark_synced<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            sqlx::query("UPDATE queued_mutations SET synced = 1 WHERE id = ?")
                .bind(id)
                .execute(self.pool())
                .await?;
            Ok(())
        }
        .boxed()
    }

    fn record_failure<'a>(&'a self, id: &'a str, error: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            sqlx::query(
                "UPDATE queued_mutations SET
                    attempts = attempts + 1,
                    last_attempt = ?,
                    last_error = ?
                 WHERE id = ? AND synced = 0",
            )
            .bind(Utc::now().to_rfc3339())
            .bind(error)
            .bind(id)
            .execute(self.pool())
            .await?;
            Ok(())
        }
        .boxed()
    }

    fn delete_synced(&self) -> BoxFuture<'_, Result<u64>> {
        async move {
            let result = sqlx::query("DELETE FROM queued_mutations WHERE synced = 1")
                .execute(self.pool())
                .await?;
            Ok(result.rows_affected())
        }
        .boxed()
    }

    fn count_unsynced(&self) -> BoxFuture<'_, Result<usize>> {
        async move {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM queued_mutations WHERE synced = 0")
                    .fetch_one(self.pool())
                    .await?;
            Ok(count as usize)
        }
        .boxed()
    }

    fn set_last_sync_time(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<()>> {
        async move {
            self.set_sync_metadata(LAST_SYNC_TIME_KEY, &at.to_rfc3339())
                .await
        }
        .boxed()
    }

    fn last_sync_time(&self) -> BoxFuture<'_, Result<Option<DateTime<Utc>>>> {
        async move {
            let Some(value) = self.get_sync_metadata(LAST_SYNC_TIME_KEY).await? else {
                return Ok(None);
            };
            let at = DateTime::parse_from_rfc3339(&value)
                .map_err(|e| StoreError::corrupt(LAST_SYNC_TIME_KEY, e.to_string()))?;
            Ok(Some(at.with_timezone(&Utc)))
        }
        .boxed()
    }
}
