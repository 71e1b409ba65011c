//! # Offline-Aware Adapters
//!
//! Wrappers application hooks use instead of calling the remote directly.
//! Each call names a remote future and, optionally, a cache key and an
//! offline future; the adapter decides which one runs.
//!
//! ## Key Components
//!
//! - `query.rs`: Reads. Online results are mirrored into the local store;
//!   offline reads come from the offline future or the cached snapshot.
//! - `mutation.rs`: Writes. Offline writes are applied locally and queued
//!   for the sync manager.
//!
//! A request without a cache key (table and tenant) is remote-only.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tenantdesk_offline::adapters::OfflineAdapters;
//! use tenantdesk_offline::offline::OperationKind;
//! use tenantdesk_offline::remote::RemoteApi;
//!
//! # async fn example(adapters: OfflineAdapters, api: &dyn RemoteApi) -> Result<(), Box<dyn std::error::Error>> {
//! let products = adapters
//!     .query(api.select("products", "shop-1"))
//!     .cache("products", "shop-1")
//!     .run()
//!     .await?;
//!
//! let payload = json!({"name": "Jane"});
//! let created = adapters
//!     .mutate(OperationKind::Create, payload.clone(), api.insert("customers", "shop-1", &payload))
//!     .cache("customers", "shop-1")
//!     .offline(async { Ok(json!({"name": "Jane"})) })
//!     .run()
//!     .await?;
//! println!("{} products, customer via {:?}", products.records.len(), created.source);
//! # Ok(())
//! # }
//! ```

pub mod mutation;
pub mod query;

pub use mutation::{MutationRequest, MutationResult};
pub use query::{QueryRequest, QueryResult};

use crate::local_db::LocalDatabase;
use crate::shared::{AdapterError, RemoteError};
use crate::sync::{NetworkMonitor, SyncManager};
use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

pub use crate::offline::OperationKind;

/// Where an adapter's result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// The remote API answered
    Remote,
    /// The caller's offline future produced it
    OfflineFn,
    /// The local store's cached snapshot
    Cache,
}

/// Address of a request in the local store and the pending queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub table: String,
    pub tenant_id: String,
}

impl CacheKey {
    pub fn new(table: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// Shared entry point for offline-aware queries and mutations
#[derive(Debug, Clone)]
pub struct OfflineAdapters {
    monitor: Arc<NetworkMonitor>,
    store: Arc<LocalDatabase>,
    sync: Arc<SyncManager>,
}

impl OfflineAdapters {
    pub fn new(monitor: Arc<NetworkMonitor>, store: Arc<LocalDatabase>, sync: Arc<SyncManager>) -> Self {
        Self { monitor, store, sync }
    }

    /// Start a read backed by `remote`
    pub fn query<'a, F>(&'a self, remote: F) -> QueryRequest<'a>
    where
        F: Future<Output = Result<Vec<Value>, RemoteError>> + Send + 'a,
    {
        QueryRequest::new(self, remote.boxed())
    }

    /// Start a write of `payload` backed by `remote`
    pub fn mutate<'a, F>(&'a self, kind: OperationKind, payload: Value, remote: F) -> MutationRequest<'a>
    where
        F: Future<Output = Result<Value, RemoteError>> + Send + 'a,
    {
        MutationRequest::new(self, kind, payload, remote.boxed())
    }

    pub fn monitor(&self) -> &Arc<NetworkMonitor> {
        &self.monitor
    }

    pub fn store(&self) -> &Arc<LocalDatabase> {
        &self.store
    }

    pub fn sync(&self) -> &Arc<SyncManager> {
        &self.sync
    }

    fn is_online(&self) -> bool {
        self.monitor.is_online()
    }
}

/// Offline path supplied by the caller
pub(crate) type OfflineFuture<'a, T> = BoxFuture<'a, Result<T, AdapterError>>;
