//! # Pending Operations
//!
//! A pending operation is one deferred write: the intent to create, update or
//! delete a record on the remote once it can be reached. Operations are
//! persisted by the local store and replayed by the sync manager.
//!
//! ## Ordering
//!
//! Every operation has an [`OperationKey`]. Operations sharing a key are
//! replayed strictly in enqueue order; operations with different keys are
//! independent. The key is `(tenant, table, record id)`, or
//! `(tenant, table, operation id)` when the payload carries no id yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of deferred write
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Insert a new row
    Create,
    /// Replace fields of an existing row
    Update,
    /// Remove a row
    Delete,
}

impl OperationKind {
    /// Storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }

    /// Parse a storage name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(OperationKind::Create),
            "update" => Some(OperationKind::Update),
            "delete" => Some(OperationKind::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering key for pending operations
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub tenant_id: String,
    pub table: String,
    pub record: String,
}

/// Durable record describing one deferred write
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOperation {
    /// Enqueue sequence number; total order over the queue
    pub seq: i64,
    /// Unique operation ID
    pub operation_id: Uuid,
    /// Write kind
    pub kind: OperationKind,
    /// Target table
    pub table: String,
    /// Owning tenant
    pub tenant_id: String,
    /// Target record id, when the payload carries one
    pub record_id: Option<String>,
    /// Payload sent to the remote
    pub payload: Value,
    /// When the operation was queued
    pub enqueued_at: DateTime<Utc>,
    /// Number of failed remote attempts
    pub attempts: u32,
    /// Error message from the last failure
    pub last_error: Option<String>,
    /// Timestamp of the last attempt
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Last failure was a permanent rejection
    pub rejected: bool,
}

impl PendingOperation {
    /// Ordering key of this operation
    pub fn key(&self) -> OperationKey {
        OperationKey {
            tenant_id: self.tenant_id.clone(),
            table: self.table.clone(),
            record: self
                .record_id
                .clone()
                .unwrap_or_else(|| self.operation_id.to_string()),
        }
    }

    /// Whether the operation has failed at least once
    pub fn has_failed(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Extract a record id from a payload's `id` field
///
/// String and integer ids are accepted; anything else counts as absent.
pub fn record_id_of(payload: &Value) -> Option<String> {
    match payload.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
