//! # Remote API
//!
//! The seam between the offline core and the hosted backend. The sync
//! manager only ever talks to a [`RemoteApi`]; tests plug in a mock and
//! production plugs in [`RestRemote`].
//!
//! Every call is scoped to one tenant. Errors are classified by
//! [`RemoteError::is_retryable`] so a permanently rejected write is not
//! retried forever.

#[cfg(feature = "rest")]
pub mod rest;

#[cfg(feature = "rest")]
pub use rest::RestRemote;

use crate::offline::queue::{OperationKind, PendingOperation};
use crate::shared::RemoteError;
use serde_json::Value;

/// Hosted relational backend, addressed by table and tenant
#[async_trait::async_trait]
pub trait RemoteApi: Send + Sync {
    /// Every row of `table` visible to the tenant
    async fn select(&self, table: &str, tenant_id: &str) -> Result<Vec<Value>, RemoteError>;

    /// Insert a row; returns the stored row when the backend echoes it
    async fn insert(&self, table: &str, tenant_id: &str, payload: &Value) -> Result<Value, RemoteError>;

    /// Update the row with `record_id`
    async fn update(
        &self,
        table: &str,
        tenant_id: &str,
        record_id: &str,
        payload: &Value,
    ) -> Result<Value, RemoteError>;

    /// Delete the row with `record_id`
    async fn delete(&self, table: &str, tenant_id: &str, record_id: &str) -> Result<(), RemoteError>;

    /// Replay a queued operation
    async fn apply(&self, operation: &PendingOperation) -> Result<Value, RemoteError> {
        let table = operation.table.as_str();
        let tenant = operation.tenant_id.as_str();

        match operation.kind {
            OperationKind::Create => self.insert(table, tenant, &operation.payload).await,
            OperationKind::Update => {
                let id = addressed_id(operation)?;
                self.update(table, tenant, id, &operation.payload).await
            }
            OperationKind::Delete => {
                let id = addressed_id(operation)?;
                self.delete(table, tenant, id).await?;
                Ok(Value::Null)
            }
        }
    }
}

fn addressed_id(operation: &PendingOperation) -> Result<&str, RemoteError> {
    operation.record_id.as_deref().ok_or_else(|| {
        RemoteError::rejected(
            422,
            format!("{} on '{}' has no record id", operation.kind, operation.table),
        )
    })
}
