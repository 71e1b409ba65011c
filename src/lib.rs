//! TenantDesk Offline Core
//!
//! Offline-first data layer for the TenantDesk business suite (point of sale,
//! school administration, rentals, repairs, restaurant ordering). The UI talks
//! to a hosted relational backend; this crate keeps it working when that
//! backend is out of reach.
//!
//! # Overview
//!
//! - **`sync::network_monitor`** - Connectivity and link-quality tracking with
//!   synchronous fan-out to subscribers
//! - **`local_db`** - Durable, tenant-scoped SQLite cache of remote records plus
//!   the durable queue of pending writes
//! - **`sync`** - The sync manager: drains pending writes against the remote API,
//!   single-flight, with per-record ordering and status reporting
//! - **`adapters`** - Offline-aware query and mutation wrappers used by
//!   application hooks
//! - **`remote`** - The remote API seam and a PostgREST-style HTTP client
//! - **`offline`** - Pending operation types, retry throttling and post-sync
//!   reconciliation
//! - **`shared`** - Error types, configuration and listener plumbing
//!
//! # Data Flow
//!
//! ```text
//! UI hook -> adapter -> NetworkMonitor::is_online()
//!     online  -> RemoteApi (mirror results into LocalDatabase)
//!     offline -> LocalDatabase + SyncManager::queue_operation()
//! NetworkMonitor: Offline -> Online/Slow  =>  SyncManager::drain_queue()
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenantdesk_offline::adapters::OfflineAdapters;
//! use tenantdesk_offline::local_db::LocalDatabase;
//! use tenantdesk_offline::remote::RestRemote;
//! use tenantdesk_offline::shared::OfflineConfig;
//! use tenantdesk_offline::sync::{NetworkMonitor, SyncManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OfflineConfig::from_env()?;
//! let store = Arc::new(LocalDatabase::open(&config).await?);
//! let monitor = Arc::new(NetworkMonitor::from_config(&config));
//! let remote = Arc::new(RestRemote::new(&config)?);
//! let sync = Arc::new(SyncManager::new(store.clone(), remote, monitor.clone(), &config));
//! let _auto_sync = sync.start_auto_sync()?;
//!
//! let adapters = OfflineAdapters::new(monitor, store, sync);
//! # let _ = adapters;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! All services are `Send + Sync` and meant to be constructed once and shared
//! through `Arc`. Network notifications are synchronous; everything touching
//! storage or the remote API is async and runs on tokio.

/// Shared errors, configuration and listener plumbing
pub mod shared;

/// Durable local cache and pending-operation queue
pub mod local_db;

/// Pending operations, retry throttling and reconciliation
pub mod offline;

/// Remote API boundary
pub mod remote;

/// Network monitor and sync manager
pub mod sync;

/// Offline-aware query and mutation adapters
pub mod adapters;
