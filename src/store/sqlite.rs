// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Watermark persistence in SQLite.
//!
//! One database can hold the watermarks of many collections. Rows are keyed
//! by collection name and direction:
//!
//! ```text
//! sync_watermarks(collection, operation, at, updated_at)
//!                  "people"    "fetch"   "2020-06-01T00:00:00Z"
//! ```
//!
//! # Reads and Writes
//!
//! Nothing is cached. `get_*` reads the row on every call, so several
//! instances (or processes) opened on the same database and collection see
//! each other's advances. `set_*` returns only once the row is written.
//!
//! # SQLite Busy Handling
//!
//! SQLITE_BUSY/SQLITE_LOCKED are retried with exponential backoff (up to 5
//! attempts, 10ms doubling to 500ms). Other errors fail immediately.

use crate::error::MetadataError;
use crate::item::Timestamp;
use crate::metadata::{CollectionSyncMetadata, MetadataFuture, MetadataResult, SyncOperation};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const SQLITE_RETRY_MAX_ATTEMPTS: u32 = 5;
const SQLITE_RETRY_BASE_DELAY_MS: u64 = 10;
const SQLITE_RETRY_MAX_DELAY_MS: u64 = 500;

/// Check if an error is a retryable SQLite busy/locked error
fn is_sqlite_busy_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            // SQLITE_BUSY = 5, SQLITE_LOCKED = 6
            if let Some(code) = db_err.code() {
                return code == "5" || code == "6";
            }
            let msg = db_err.message().to_lowercase();
            msg.contains("database is locked") || msg.contains("database is busy")
        }
        _ => false,
    }
}

/// Run a statement, retrying on SQLITE_BUSY/SQLITE_LOCKED.
async fn execute_with_retry<F, Fut, T>(
    operation_name: &str,
    mut f: F,
) -> std::result::Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    let mut delay_ms = SQLITE_RETRY_BASE_DELAY_MS;

    loop {
        attempts += 1;
        match f().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(operation = operation_name, attempts, "SQLite operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if is_sqlite_busy_error(&e) && attempts < SQLITE_RETRY_MAX_ATTEMPTS => {
                warn!(
                    operation = operation_name,
                    attempts,
                    max_attempts = SQLITE_RETRY_MAX_ATTEMPTS,
                    delay_ms,
                    "SQLite busy, retrying"
                );
                crate::metrics::record_retry(operation_name);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = (delay_ms * 2).min(SQLITE_RETRY_MAX_DELAY_MS);
            }
            Err(e) => {
                if is_sqlite_busy_error(&e) {
                    warn!(operation = operation_name, attempts, "SQLite busy, max retries exceeded");
                }
                return Err(e);
            }
        }
    }
}

fn encode_timestamp(at: Timestamp) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn decode_timestamp(raw: &str) -> MetadataResult<Timestamp> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| MetadataError::Config(format!("Corrupt watermark {:?}: {}", raw, e)))
}

/// Watermarks of one collection, stored in SQLite.
pub struct SqliteSyncMetadata {
    pool: SqlitePool,
    collection: String,
    path: String,
}

impl SqliteSyncMetadata {
    /// Open (or create) the database at `path` for the collection `collection`.
    ///
    /// Creates the table if needed.
    pub async fn new(path: impl AsRef<Path>, collection: impl Into<String>) -> MetadataResult<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let collection = collection.into();
        info!(path = %path_str, collection = %collection, "Opening watermark store");

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path_str))
            .map_err(|e| MetadataError::Config(format!("Invalid SQLite path: {}", e)))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_watermarks (
                collection TEXT NOT NULL,
                operation TEXT NOT NULL,
                at TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, operation)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            collection,
            path: path_str,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Database path (for diagnostics).
    pub fn path(&self) -> &str {
        &self.path
    }

    async fn get(&self, op: SyncOperation) -> MetadataResult<Option<Timestamp>> {
        let pool = &self.pool;
        let collection = &self.collection;

        let row: Option<(String,)> = execute_with_retry("watermark_get", || async {
            sqlx::query_as("SELECT at FROM sync_watermarks WHERE collection = ? AND operation = ?")
                .bind(collection)
                .bind(op.as_str())
                .fetch_optional(pool)
                .await
        })
        .await?;

        row.map(|(at,)| decode_timestamp(&at)).transpose()
    }

    async fn set(&self, op: SyncOperation, at: Timestamp) -> MetadataResult<()> {
        let encoded = encode_timestamp(at);
        let now = Utc::now().timestamp_millis();
        let pool = &self.pool;
        let collection = &self.collection;

        execute_with_retry("watermark_set", || async {
            sqlx::query(
                r#"
                INSERT INTO sync_watermarks (collection, operation, at, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(collection, operation) DO UPDATE SET
                    at = excluded.at,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(collection)
            .bind(op.as_str())
            .bind(&encoded)
            .bind(now)
            .execute(pool)
            .await
        })
        .await?;

        debug!(collection = %self.collection, op = %op, at = %encoded, "Watermark persisted");
        Ok(())
    }

    /// Remove both watermarks of this collection.
    pub async fn clear(&self) -> MetadataResult<()> {
        let pool = &self.pool;
        let collection = &self.collection;

        execute_with_retry("watermark_clear", || async {
            sqlx::query("DELETE FROM sync_watermarks WHERE collection = ?")
                .bind(collection)
                .execute(pool)
                .await
        })
        .await?;

        info!(collection = %self.collection, "Cleared watermarks");
        Ok(())
    }

    /// Force flush WAL to main database.
    pub async fn checkpoint(&self) -> MetadataResult<()> {
        let pool = &self.pool;

        execute_with_retry("watermark_checkpoint", || async {
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                .execute(pool)
                .await
        })
        .await?;

        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Checkpoint and close the pool.
    pub async fn close(&self) {
        if let Err(e) = self.checkpoint().await {
            warn!(error = %e, "Failed to checkpoint WAL on close");
        }
        self.pool.close().await;
        info!(collection = %self.collection, "Watermark store closed");
    }
}

impl CollectionSyncMetadata for SqliteSyncMetadata {
    fn get_last_fetch_at(&self) -> MetadataFuture<'_, Option<Timestamp>> {
        Box::pin(self.get(SyncOperation::Fetch))
    }

    fn get_last_post_at(&self) -> MetadataFuture<'_, Option<Timestamp>> {
        Box::pin(self.get(SyncOperation::Post))
    }

    fn set_last_fetch_at(&self, at: Timestamp) -> MetadataFuture<'_, ()> {
        Box::pin(self.set(SyncOperation::Fetch, at))
    }

    fn set_last_post_at(&self, at: Timestamp) -> MetadataFuture<'_, ()> {
        Box::pin(self.set(SyncOperation::Post, at))
    }
}
