//! Offline-aware writes
//!
//! Online, the remote future runs and its result is mirrored into the cache.
//! When the remote fails, or the device is offline, the offline future runs
//! instead, its result is cached as a local edit and the original payload is
//! queued for the sync manager. Without a cache key and an offline future an
//! offline write fails; it is never silently dropped.
//!
//! The optimistic callback runs first, whatever the connectivity. Nothing is
//! rolled back automatically: a caller that registers a rollback callback
//! gets it invoked with the error when the write fails on every path.

use crate::adapters::{CacheKey, DataSource, OfflineAdapters, OfflineFuture};
use crate::offline::{record_id_of, OperationKind};
use crate::shared::{AdapterError, RemoteError};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::future::Future;
use uuid::Uuid;

type Optimistic<'a> = Box<dyn FnOnce(&Value) + Send + 'a>;
type Rollback<'a> = Box<dyn FnOnce(&AdapterError) + Send + 'a>;

/// Outcome of a write
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    /// Row returned by the remote or the offline future
    pub value: Value,
    pub source: DataSource,
    /// Queued operation when the write was deferred
    pub operation_id: Option<Uuid>,
}

/// Pending write; nothing runs until [`MutationRequest::run`]
#[must_use = "a mutation does nothing until `run` is awaited"]
pub struct MutationRequest<'a> {
    adapters: &'a OfflineAdapters,
    kind: OperationKind,
    payload: Value,
    remote: BoxFuture<'a, Result<Value, RemoteError>>,
    cache: Option<CacheKey>,
    offline: Option<OfflineFuture<'a, Value>>,
    optimistic: Option<Optimistic<'a>>,
    rollback: Option<Rollback<'a>>,
}

impl<'a> MutationRequest<'a> {
    pub(crate) fn new(
        adapters: &'a OfflineAdapters,
        kind: OperationKind,
        payload: Value,
        remote: BoxFuture<'a, Result<Value, RemoteError>>,
    ) -> Self {
        Self {
            adapters,
            kind,
            payload,
            remote,
            cache: None,
            offline: None,
            optimistic: None,
            rollback: None,
        }
    }

    /// Address of the written record in the cache and the queue
    pub fn cache(mut self, table: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        self.cache = Some(CacheKey::new(table, tenant_id));
        self
    }

    /// Offline path producing the locally applied row
    pub fn offline<F>(mut self, offline: F) -> Self
    where
        F: Future<Output = Result<Value, AdapterError>> + Send + 'a,
    {
        self.offline = Some(offline.boxed());
        self
    }

    /// Local state update applied before anything else, with the payload
    pub fn optimistic<F>(mut self, apply: F) -> Self
    where
        F: FnOnce(&Value) + Send + 'a,
    {
        self.optimistic = Some(Box::new(apply));
        self
    }

    /// Called with the error when the write fails after the optimistic update
    pub fn rollback<F>(mut self, undo: F) -> Self
    where
        F: FnOnce(&AdapterError) + Send + 'a,
    {
        self.rollback = Some(Box::new(undo));
        self
    }

    pub async fn run(mut self) -> Result<MutationResult, AdapterError> {
        if let Some(apply) = self.optimistic.take() {
            apply(&self.payload);
        }
        let rollback = self.rollback.take();

        let result = self.execute().await;
        if let (Err(error), Some(undo)) = (&result, rollback) {
            undo(error);
        }
        result
    }

    async fn execute(self) -> Result<MutationResult, AdapterError> {
        let Self {
            adapters,
            kind,
            payload,
            remote,
            cache,
            offline,
            ..
        } = self;

        if adapters.is_online() {
            match remote.await {
                Ok(value) => {
                    if let Some(key) = &cache {
                        mirror(adapters, key, kind, &payload, &value).await;
                    }
                    return Ok(MutationResult {
                        value,
                        source: DataSource::Remote,
                        operation_id: None,
                    });
                }
                Err(error) => match (cache, offline) {
                    (Some(key), Some(offline)) => {
                        tracing::warn!("{} on {} failed online ({}); deferring", kind, key.table, error);
                        return apply_offline(adapters, key, kind, payload, offline).await;
                    }
                    _ => return Err(error.into()),
                },
            }
        }

        match (cache, offline) {
            (Some(key), Some(offline)) => apply_offline(adapters, key, kind, payload, offline).await,
            (Some(key), None) => Err(AdapterError::offline_unavailable(format!("{} on {}", kind, key.table))),
            (None, _) => Err(AdapterError::offline_unavailable(kind.to_string())),
        }
    }
}

/// Cache the remote's answer to a successful write
async fn mirror(adapters: &OfflineAdapters, key: &CacheKey, kind: OperationKind, payload: &Value, value: &Value) {
    let store = &adapters.store;
    let outcome = match kind {
        OperationKind::Delete => match record_id_of(payload) {
            Some(id) => store.delete_record(&key.table, &key.tenant_id, &id).await.map(|_| ()),
            None => Ok(()),
        },
        OperationKind::Create | OperationKind::Update => {
            let row = value.as_array().and_then(|rows| rows.first()).unwrap_or(value);
            if record_id_of(row).is_some() {
                store.save_single(&key.table, &key.tenant_id, row).await
            } else {
                Ok(())
            }
        }
    };

    if let Err(e) = outcome {
        tracing::warn!("Failed to mirror {} on {} into the cache: {}", kind, key.table, e);
    }
}

/// Run the offline future, queue the write and apply it to the cache
async fn apply_offline(
    adapters: &OfflineAdapters,
    key: CacheKey,
    kind: OperationKind,
    payload: Value,
    offline: OfflineFuture<'_, Value>,
) -> Result<MutationResult, AdapterError> {
    let value = offline.await?;

    let operation_id = adapters
        .sync
        .queue_operation(kind, &key.table, &payload, &key.tenant_id)
        .await?;

    // Rows without a server id yet are cached under the operation id until
    // the sync manager replaces them.
    let record_id = record_id_of(&payload).unwrap_or_else(|| operation_id.to_string());
    let stored = match kind {
        OperationKind::Delete => adapters
            .store
            .delete_record(&key.table, &key.tenant_id, &record_id)
            .await
            .map(|_| ()),
        OperationKind::Create | OperationKind::Update => {
            let local = if value.is_null() { &payload } else { &value };
            adapters
                .store
                .save_local(&key.table, &key.tenant_id, &record_id, local)
                .await
        }
    };
    if let Err(e) = stored {
        tracing::warn!("Queued {} on {} but could not update the cache: {}", kind, key.table, e);
    }

    Ok(MutationResult {
        value,
        source: DataSource::OfflineFn,
        operation_id: Some(operation_id),
    })
}
