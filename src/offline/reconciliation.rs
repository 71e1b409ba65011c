//! # Cache Reconciliation
//!
//! Brings the local cache in line with the remote after a queued operation
//! has been accepted.
//!
//! ## Rules
//!
//! - **Create/Update**: A row returned by the remote replaces the cached copy
//!   and is marked synced. A create that was cached under its operation id
//!   (no id until the server assigned one) has that temporary row removed.
//! - **Delete**: The local delete already happened; nothing further.
//! - **Superseded**: When a later write to the same record is still queued,
//!   the cached row holds that newer local edit and stays unsynced.
//!
//! Reconciliation failures never undo the remote write. They are reported to
//! the caller, which logs and moves on.

use crate::local_db::{LocalDatabase, Result};
use crate::offline::queue::{record_id_of, OperationKind, PendingOperation};
use serde_json::Value;

/// What reconciliation did to the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Remote row cached as synced under this id
    Replaced { record_id: String },
    /// Existing local row flagged as synced
    MarkedSynced { record_id: String },
    /// A newer queued write owns the cached row
    Superseded { record_id: String },
    /// Nothing to do
    Unchanged,
}

/// Apply the remote's response for `operation` to the local cache
pub async fn reconcile(
    store: &LocalDatabase,
    operation: &PendingOperation,
    remote: &Value,
) -> Result<ReconciliationOutcome> {
    if operation.kind == OperationKind::Delete {
        return Ok(ReconciliationOutcome::Unchanged);
    }

    if let Some(record_id) = &operation.record_id {
        if store
            .has_later_operation(&operation.table, &operation.tenant_id, record_id, operation.seq)
            .await?
        {
            return Ok(ReconciliationOutcome::Superseded {
                record_id: record_id.clone(),
            });
        }
    }

    // Rows cached before the server assigned an id live under the operation id.
    let temporary_id = match operation.record_id {
        Some(_) => None,
        None => Some(operation.operation_id.to_string()),
    };

    let remote_row = remote.as_array().and_then(|rows| rows.first()).unwrap_or(remote);

    if let Some(record_id) = remote_row.is_object().then(|| record_id_of(remote_row)).flatten() {
        store
            .save_single(&operation.table, &operation.tenant_id, remote_row)
            .await?;
        if let Some(temporary_id) = temporary_id.filter(|temp| *temp != record_id) {
            store
                .delete_record(&operation.table, &operation.tenant_id, &temporary_id)
                .await?;
        }
        return Ok(ReconciliationOutcome::Replaced { record_id });
    }

    let record_id = match (&operation.record_id, temporary_id) {
        (Some(id), _) => id.clone(),
        (None, Some(temp)) => temp,
        (None, None) => return Ok(ReconciliationOutcome::Unchanged),
    };

    if store
        .get_record(&operation.table, &operation.tenant_id, &record_id)
        .await?
        .is_none()
    {
        return Ok(ReconciliationOutcome::Unchanged);
    }

    store
        .mark_synced(&operation.table, &operation.tenant_id, &record_id)
        .await?;
    Ok(ReconciliationOutcome::MarkedSynced { record_id })
}
