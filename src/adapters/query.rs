//! Offline-aware reads

use crate::adapters::{CacheKey, DataSource, OfflineAdapters, OfflineFuture};
use crate::shared::{AdapterError, RemoteError};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::future::Future;

/// Rows returned by a query and where they came from
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub records: Vec<Value>,
    pub source: DataSource,
}

impl QueryResult {
    fn new(records: Vec<Value>, source: DataSource) -> Self {
        Self { records, source }
    }
}

/// Pending read; nothing runs until [`QueryRequest::run`]
#[must_use = "a query does nothing until `run` is awaited"]
pub struct QueryRequest<'a> {
    adapters: &'a OfflineAdapters,
    remote: BoxFuture<'a, Result<Vec<Value>, RemoteError>>,
    cache: Option<CacheKey>,
    offline: Option<OfflineFuture<'a, Vec<Value>>>,
}

impl<'a> QueryRequest<'a> {
    pub(crate) fn new(adapters: &'a OfflineAdapters, remote: BoxFuture<'a, Result<Vec<Value>, RemoteError>>) -> Self {
        Self {
            adapters,
            remote,
            cache: None,
            offline: None,
        }
    }

    /// Mirror results into, and fall back to, the cache of `table` for `tenant_id`
    pub fn cache(mut self, table: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        self.cache = Some(CacheKey::new(table, tenant_id));
        self
    }

    /// Offline path, preferred over the cached snapshot
    pub fn offline<F>(mut self, offline: F) -> Self
    where
        F: Future<Output = Result<Vec<Value>, AdapterError>> + Send + 'a,
    {
        self.offline = Some(offline.boxed());
        self
    }

    pub async fn run(self) -> Result<QueryResult, AdapterError> {
        let Self {
            adapters,
            remote,
            cache,
            offline,
        } = self;

        let Some(key) = cache else {
            return Ok(QueryResult::new(remote.await?, DataSource::Remote));
        };

        if adapters.is_online() {
            match remote.await {
                Ok(records) => {
                    if let Err(e) = adapters.store.save_records(&key.table, &key.tenant_id, &records).await {
                        tracing::warn!("Failed to cache {} rows for tenant {}: {}", key.table, key.tenant_id, e);
                    }
                    return Ok(QueryResult::new(records, DataSource::Remote));
                }
                Err(error) => {
                    tracing::warn!("Query on {} failed while online: {}", key.table, error);
                    return match fallback(adapters, &key, offline).await {
                        Some(result) => result,
                        None => Err(error.into()),
                    };
                }
            }
        }

        tracing::debug!("Offline query on {}", key.table);
        match fallback(adapters, &key, offline).await {
            Some(result) => result,
            None => Err(AdapterError::no_offline_data(&key.table)),
        }
    }
}

/// Offline future if given, else a non-empty cached snapshot
async fn fallback(
    adapters: &OfflineAdapters,
    key: &CacheKey,
    offline: Option<OfflineFuture<'_, Vec<Value>>>,
) -> Option<Result<QueryResult, AdapterError>> {
    if let Some(offline) = offline {
        return Some(offline.await.map(|records| QueryResult::new(records, DataSource::OfflineFn)));
    }

    match adapters.store.get_payloads(&key.table, &key.tenant_id).await {
        Ok(records) if !records.is_empty() => Some(Ok(QueryResult::new(records, DataSource::Cache))),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Failed to read cached {} for tenant {}: {}", key.table, key.tenant_id, e);
            None
        }
    }
}
