//! # Cached Record Operations
//!
//! The record cache holds the last snapshot seen from the remote API for each
//! `(table, tenant, id)`, and speculative local edits made while offline.
//!
//! ## Features
//!
//! - **Upsert**: Saving replaces a cached payload wholesale; payloads are never merged
//! - **Insertion Order**: Reads return rows in the order they were first cached
//! - **Sync Tracking**: Local edits carry `needs_sync` until the remote confirms them
//! - **Tenant Scoping**: Every read and write is bound to one tenant

use crate::local_db::{LocalDatabase, Result};
use crate::shared::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Row;

/// Local copy of a remote entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRecord {
    /// Table identifier
    pub table: String,
    /// Owning tenant
    pub tenant_id: String,
    /// Record primary key
    pub id: String,
    /// Full record payload
    pub payload: Value,
    /// When the payload was last confirmed by the remote
    pub synced_at: Option<DateTime<Utc>>,
    /// Payload is a local edit the remote has not confirmed yet
    pub needs_sync: bool,
}

const UPSERT_SQL: &str = "INSERT INTO cached_records (
        table_name, tenant_id, record_id, payload, synced_at, needs_sync, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (table_name, tenant_id, record_id) DO UPDATE SET
        payload = excluded.payload,
        synced_at = excluded.synced_at,
        needs_sync = excluded.needs_sync,
        updated_at = excluded.updated_at";

impl LocalDatabase {
    /// Cache a remote snapshot of `records`
    ///
    /// A record without an id or, for registered tables, not matching the
    /// table's shape is logged and left out; the rest of the snapshot is
    /// written in one transaction. Returns how many records were cached.
    pub async fn save_records(&self, table: &str, tenant_id: &str, records: &[Value]) -> Result<usize> {
        let handler = self.registry().handler(table);
        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            match handler.record_id(record) {
                Ok(id) => prepared.push((id, serde_json::to_string(record)?)),
                Err(e) => tracing::warn!("Not caching {} row for tenant {}: {}", table, tenant_id, e),
            }
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool().begin().await?;
        for (id, payload) in &prepared {
            sqlx::query(UPSERT_SQL)
                .bind(table)
                .bind(tenant_id)
                .bind(id)
                .bind(payload)
                .bind(&now)
                .bind(false)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::debug!("Cached {} {} rows for tenant {}", prepared.len(), table, tenant_id);
        Ok(prepared.len())
    }

    /// Cache a single remote record; fails when the record is not cacheable
    pub async fn save_single(&self, table: &str, tenant_id: &str, record: &Value) -> Result<()> {
        self.registry().handler(table).record_id(record)?;
        self.save_records(table, tenant_id, std::slice::from_ref(record)).await?;
        Ok(())
    }

    /// Cache a local edit that the remote has not confirmed
    ///
    /// The id is explicit because offline creates may not have a server id
    /// yet. Local edits skip shape validation: the offline handler owns
    /// their content.
    pub async fn save_local(&self, table: &str, tenant_id: &str, record_id: &str, record: &Value) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(UPSERT_SQL)
            .bind(table)
            .bind(tenant_id)
            .bind(record_id)
            .bind(serde_json::to_string(record)?)
            .bind(Option::<String>::None)
            .bind(true)
            .bind(&now)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// All cached rows of `table` for a tenant, in first-insertion order
    ///
    /// Returns an empty vector when nothing is cached.
    pub async fn get_records(&self, table: &str, tenant_id: &str) -> Result<Vec<CachedRecord>> {
        let rows = sqlx::query(
            "SELECT table_name, tenant_id, record_id, payload, synced_at, needs_sync
             FROM cached_records
             WHERE table_name = ? AND tenant_id = ?
             ORDER BY seq ASC",
        )
        .bind(table)
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// Payloads of every cached row of `table` for a tenant
    pub async fn get_payloads(&self, table: &str, tenant_id: &str) -> Result<Vec<Value>> {
        Ok(self
            .get_records(table, tenant_id)
            .await?
            .into_iter()
            .map(|record| record.payload)
            .collect())
    }

    /// One cached row
    pub async fn get_record(&self, table: &str, tenant_id: &str, record_id: &str) -> Result<Option<CachedRecord>> {
        let row = sqlx::query(
            "SELECT table_name, tenant_id, record_id, payload, synced_at, needs_sync
             FROM cached_records
             WHERE table_name = ? AND tenant_id = ? AND record_id = ?",
        )
        .bind(table)
        .bind(tenant_id)
        .bind(record_id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Remove one cached row; returns whether it existed
    pub async fn delete_record(&self, table: &str, tenant_id: &str, record_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM cached_records WHERE table_name = ? AND tenant_id = ? AND record_id = ?",
        )
        .bind(table)
        .bind(tenant_id)
        .bind(record_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a cached row as confirmed by the remote
    pub async fn mark_synced(&self, table: &str, tenant_id: &str, record_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE cached_records SET needs_sync = 0, synced_at = ?
             WHERE table_name = ? AND tenant_id = ? AND record_id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(table)
        .bind(tenant_id)
        .bind(record_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Cached rows of a tenant still carrying unconfirmed local edits
    pub async fn unsynced_records(&self, tenant_id: &str) -> Result<Vec<CachedRecord>> {
        let rows = sqlx::query(
            "SELECT table_name, tenant_id, record_id, payload, synced_at, needs_sync
             FROM cached_records
             WHERE tenant_id = ? AND needs_sync = 1
             ORDER BY seq ASC",
        )
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// Drop every cached row of a tenant
    ///
    /// Pending operations are kept: clearing the cache never discards an
    /// intent to sync.
    pub async fn clear_tenant(&self, tenant_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cached_records WHERE tenant_id = ?")
            .bind(tenant_id)
            .execute(self.pool())
            .await?;
        tracing::info!("Cleared {} cached rows for tenant {}", result.rows_affected(), tenant_id);
        Ok(result.rows_affected())
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<CachedRecord> {
    let payload: String = row.try_get("payload")?;
    let synced_at: Option<String> = row.try_get("synced_at")?;

    Ok(CachedRecord {
        table: row.try_get("table_name")?,
        tenant_id: row.try_get("tenant_id")?,
        id: row.try_get("record_id")?,
        payload: serde_json::from_str(&payload)?,
        synced_at: synced_at.as_deref().map(parse_timestamp).transpose()?,
        needs_sync: row.try_get("needs_sync")?,
    })
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt("timestamp", format!("{}: {}", value, e)))
}
