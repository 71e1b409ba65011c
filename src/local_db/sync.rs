//! # Pending Queue and Sync Metadata
//!
//! Durable storage for deferred writes and for sync bookkeeping such as the
//! last successful sync time.
//!
//! ## Features
//!
//! - **Durable Queue**: An operation is on disk before `enqueue_operation` returns
//! - **Total Order**: Operations are read back in enqueue (`seq`) order
//! - **Atomic Failure Updates**: Attempts and last error change in one statement
//! - **Sync Metadata**: Small key/value table for sync state that must survive restarts

use crate::local_db::records::parse_timestamp;
use crate::local_db::{LocalDatabase, Result};
use crate::offline::queue::{record_id_of, OperationKind, PendingOperation};
use crate::shared::StoreError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

const LAST_SYNC_TIME_KEY: &str = "last_sync_time";

const OPERATION_COLUMNS: &str = "seq, operation_id, kind, table_name, tenant_id, record_id, payload,
     enqueued_at, attempts, last_error, last_attempt_at, rejected";

impl LocalDatabase {
    /// Persist a deferred write and return it
    pub async fn enqueue_operation(
        &self,
        kind: OperationKind,
        table: &str,
        tenant_id: &str,
        payload: &Value,
    ) -> Result<PendingOperation> {
        let operation_id = Uuid::new_v4();
        let record_id = record_id_of(payload);
        let enqueued_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO pending_operations (
                operation_id, kind, table_name, tenant_id, record_id, payload, enqueued_at, attempts
             ) VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(operation_id.to_string())
        .bind(kind.as_str())
        .bind(table)
        .bind(tenant_id)
        .bind(record_id.clone())
        .bind(serde_json::to_string(payload)?)
        .bind(enqueued_at.to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(PendingOperation {
            seq: result.last_insert_rowid(),
            operation_id,
            kind,
            table: table.to_string(),
            tenant_id: tenant_id.to_string(),
            record_id,
            payload: payload.clone(),
            enqueued_at,
            attempts: 0,
            last_error: None,
            last_attempt_at: None,
            rejected: false,
        })
    }

    /// Every queued operation in enqueue order
    pub async fn pending_operations(&self) -> Result<Vec<PendingOperation>> {
        self.pending_operations_after(0).await
    }

    /// Queued operations enqueued after `seq`, in enqueue order
    pub async fn pending_operations_after(&self, seq: i64) -> Result<Vec<PendingOperation>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pending_operations WHERE seq > ? ORDER BY seq ASC",
            OPERATION_COLUMNS
        ))
        .bind(seq)
        .fetch_all(self.pool())
        .await?;

        Ok(decode_rows(&rows))
    }

    /// Whether a write to the same record was queued after `seq`
    pub async fn has_later_operation(&self, table: &str, tenant_id: &str, record_id: &str, seq: i64) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pending_operations
             WHERE table_name = ? AND tenant_id = ? AND record_id = ? AND seq > ?",
        )
        .bind(table)
        .bind(tenant_id)
        .bind(record_id)
        .bind(seq)
        .fetch_one(self.pool())
        .await?;
        Ok(count.0 > 0)
    }

    /// Queued operations whose last attempt failed
    pub async fn failed_operations(&self) -> Result<Vec<PendingOperation>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pending_operations WHERE last_error IS NOT NULL ORDER BY seq ASC",
            OPERATION_COLUMNS
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(decode_rows(&rows))
    }

    /// One queued operation
    pub async fn get_operation(&self, operation_id: &Uuid) -> Result<Option<PendingOperation>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pending_operations WHERE operation_id = ?",
            OPERATION_COLUMNS
        ))
        .bind(operation_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_operation).transpose()
    }

    /// Remove a queued operation; returns whether it existed
    pub async fn remove_operation(&self, operation_id: &Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending_operations WHERE operation_id = ?")
            .bind(operation_id.to_string())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a failed attempt
    ///
    /// A single UPDATE so concurrent readers never see the attempt count and
    /// the error out of step.
    pub async fn record_operation_failure(&self, operation_id: &Uuid, error: &str, rejected: bool) -> Result<()> {
        sqlx::query(
            "UPDATE pending_operations SET
                attempts = attempts + 1,
                last_error = ?,
                last_attempt_at = ?,
                rejected = ?
             WHERE operation_id = ?",
        )
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(rejected)
        .bind(operation_id.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Size of the pending queue
    pub async fn count_pending_operations(&self) -> Result<usize> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_operations")
            .fetch_one(self.pool())
            .await?;
        Ok(count.0 as usize)
    }

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

    /// Get last sync timestamp
    pub async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_sync_metadata(LAST_SYNC_TIME_KEY)
            .await?
            .as_deref()
            .map(parse_timestamp)
            .transpose()
    }

    /// Set last sync timestamp
    pub async fn set_last_sync_time(&self, time: DateTime<Utc>) -> Result<()> {
        self.set_sync_metadata(LAST_SYNC_TIME_KEY, &time.to_rfc3339()).await
    }
}

fn decode_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Vec<PendingOperation> {
    rows.iter()
        .filter_map(|row| match row_to_operation(row) {
            Ok(operation) => Some(operation),
            Err(e) => {
                // Left in place so it still counts as pending and can be discarded.
                tracing::error!("Skipping unreadable pending operation: {}", e);
                None
            }
        })
        .collect()
}

fn row_to_operation(row: &sqlx::sqlite::SqliteRow) -> Result<PendingOperation> {
    let operation_id: String = row.try_get("operation_id")?;
    let kind: String = row.try_get("kind")?;
    let payload: String = row.try_get("payload")?;
    let enqueued_at: String = row.try_get("enqueued_at")?;
    let last_attempt_at: Option<String> = row.try_get("last_attempt_at")?;
    let attempts: i64 = row.try_get("attempts")?;

    Ok(PendingOperation {
        seq: row.try_get("seq")?,
        operation_id: Uuid::parse_str(&operation_id)
            .map_err(|e| StoreError::corrupt("pending_operations", e.to_string()))?,
        kind: OperationKind::parse(&kind)
            .ok_or_else(|| StoreError::corrupt("pending_operations", format!("unknown kind {}", kind)))?,
        table: row.try_get("table_name")?,
        tenant_id: row.try_get("tenant_id")?,
        record_id: row.try_get("record_id")?,
        payload: serde_json::from_str(&payload)?,
        enqueued_at: parse_timestamp(&enqueued_at)?,
        attempts: attempts.max(0) as u32,
        last_error: row.try_get("last_error")?,
        last_attempt_at: last_attempt_at.as_deref().map(parse_timestamp).transpose()?,
        rejected: row.try_get("rejected")?,
    })
}
