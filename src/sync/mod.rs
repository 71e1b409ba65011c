//! # Sync Manager
//!
//! Replays writes queued while offline against the remote API and reports
//! aggregate sync state.
//!
//! ## Architecture
//!
//! - **Network Monitor** (`network_monitor.rs`): connectivity detection with
//!   synchronous subscribers
//! - **Sync State** (`sync_state.rs`): status snapshots and drain reports
//! - **Sync Manager** (this module): the drain cycle
//!
//! ## Drain Cycle
//!
//! Only one drain runs at a time; a request arriving while one is in flight
//! returns immediately and the running drain picks up anything enqueued in
//! the meantime. Operations are replayed in enqueue order. When an operation
//! fails, every later operation with the same `(table, record)` key waits for
//! the next drain, so a stale update is never applied after a delete.
//!
//! Automatic drains (network transitions) respect the retry backoff and skip
//! operations the remote rejected. `sync_now` ignores both.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tenantdesk_offline::offline::OperationKind;
//! use tenantdesk_offline::sync::SyncManager;
//!
//! # async fn example(sync: Arc<SyncManager>) -> Result<(), Box<dyn std::error::Error>> {
//! let _auto = sync.start_auto_sync()?;
//!
//! sync.queue_operation(OperationKind::Create, "sales", &json!({"total": 12.5}), "shop-1")
//!     .await?;
//!
//! let report = sync.sync_now().await?;
//! println!("{} pushed, {} pending", report.succeeded, sync.get_status().pending_count);
//! # Ok(())
//! # }
//! ```

pub mod network_monitor;
pub mod sync_state;

pub use network_monitor::{
    ConnectionState, ConnectivitySignal, EffectiveType, LinkQuality, LinkThresholds, NetworkMonitor,
};
pub use sync_state::{DrainReport, SyncState, SyncStatus};

use crate::local_db::LocalDatabase;
use crate::offline::{reconcile, BackoffStrategy, OperationKey, OperationKind, PendingOperation};
use crate::remote::RemoteApi;
use crate::shared::{Listeners, OfflineConfig, Subscription, SyncError};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainMode {
    /// Network transition or scheduled trigger
    Automatic,
    /// User asked for "Sync Now"
    Manual,
}

/// Holds the single-flight flag for the lifetime of a drain
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains the pending queue against the remote API
pub struct SyncManager {
    store: Arc<LocalDatabase>,
    remote: Arc<dyn RemoteApi>,
    monitor: Arc<NetworkMonitor>,
    backoff: BackoffStrategy,
    status: Mutex<SyncStatus>,
    listeners: Listeners<SyncStatus>,
    draining: AtomicBool,
    eligible: AtomicBool,
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("status", &self.get_status())
            .field("backoff", &self.backoff)
            .field("draining", &self.draining.load(Ordering::Relaxed))
            .field("eligible", &self.eligible.load(Ordering::Relaxed))
            .finish()
    }
}

impl SyncManager {
    /// Create a sync manager
    ///
    /// The status starts empty; call [`SyncManager::refresh_status`] to load
    /// the persisted queue depth and last sync time.
    pub fn new(
        store: Arc<LocalDatabase>,
        remote: Arc<dyn RemoteApi>,
        monitor: Arc<NetworkMonitor>,
        config: &OfflineConfig,
    ) -> Self {
        Self {
            store,
            remote,
            monitor,
            backoff: BackoffStrategy::from_config(config),
            status: Mutex::new(SyncStatus::default()),
            listeners: Listeners::new(),
            draining: AtomicBool::new(false),
            eligible: AtomicBool::new(true),
        }
    }

    /// Override the retry backoff used by automatic drains
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Durably queue a write for later replay
    ///
    /// The operation is on disk before this returns.
    pub async fn queue_operation(
        &self,
        kind: OperationKind,
        table: &str,
        payload: &Value,
        tenant_id: &str,
    ) -> Result<Uuid, SyncError> {
        let operation = match self.store.enqueue_operation(kind, table, tenant_id, payload).await {
            Ok(operation) => operation,
            Err(e) => {
                tracing::error!("Failed to queue {} on {} for tenant {}: {}", kind, table, tenant_id, e);
                return Err(e.into());
            }
        };

        tracing::info!(
            "Queued {} on {} (operation {}, seq {})",
            kind,
            table,
            operation.operation_id,
            operation.seq
        );
        self.refresh_status().await?;
        Ok(operation.operation_id)
    }

    /// Drain the queue as an automatic trigger would
    pub async fn drain_queue(&self) -> Result<DrainReport, SyncError> {
        self.drain(DrainMode::Automatic).await
    }

    /// Drain the queue now, ignoring backoff and earlier rejections
    pub async fn sync_now(&self) -> Result<DrainReport, SyncError> {
        self.drain(DrainMode::Manual).await
    }

    /// Current status snapshot
    pub fn get_status(&self) -> SyncStatus {
        self.lock_status().clone()
    }

    /// Reload queue depth and last sync time from the store and publish them
    pub async fn refresh_status(&self) -> Result<SyncStatus, SyncError> {
        let pending_count = self.store.count_pending_operations().await?;
        let last_sync_time = self.store.last_sync_time().await?;

        Ok(self.update_status(|status| {
            status.pending_count = pending_count;
            status.last_sync_time = last_sync_time.or(status.last_sync_time);
            if status.state != SyncState::Syncing && pending_count == 0 {
                status.state = SyncState::Idle;
            }
        }))
    }

    /// Register a status callback
    pub fn subscribe_to_status<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.listeners.subscribe(callback)
    }

    /// Drain automatically whenever connectivity comes back
    ///
    /// Every transition from offline to a connected state spawns exactly one
    /// drain on the current tokio runtime. When already connected, operations
    /// persisted by an earlier session are drained right away. Keep the
    /// returned subscription to stop auto sync later.
    pub fn start_auto_sync(self: &Arc<Self>) -> Result<Subscription, SyncError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let manager: Weak<Self> = Arc::downgrade(self);
        let previous = Mutex::new(self.monitor.state());

        let callback_runtime = runtime.clone();
        let subscription = self.monitor.subscribe(move |state| {
            let was = std::mem::replace(&mut *previous.lock().unwrap_or_else(|p| p.into_inner()), state);
            if was.is_connected() || !state.is_connected() {
                return;
            }
            let Some(manager) = manager.upgrade() else {
                return;
            };

            tracing::info!("Connectivity restored ({:?}); draining pending queue", state);
            callback_runtime.spawn(async move { manager.automatic_drain().await });
        });

        if self.monitor.is_online() {
            let manager = Arc::clone(self);
            runtime.spawn(async move {
                match manager.store.count_pending_operations().await {
                    Ok(0) => {}
                    Ok(pending) => {
                        tracing::info!("{} operations pending from an earlier session; draining", pending);
                        manager.automatic_drain().await;
                    }
                    Err(e) => tracing::warn!("Failed to count pending operations at startup: {}", e),
                }
            });
        }

        Ok(subscription)
    }

    /// Remove a queued operation without sending it
    pub async fn discard_operation(&self, operation_id: &Uuid) -> Result<(), SyncError> {
        if !self.store.remove_operation(operation_id).await? {
            return Err(SyncError::UnknownOperation(*operation_id));
        }
        tracing::warn!("Discarded pending operation {}", operation_id);
        self.refresh_status().await?;
        Ok(())
    }

    /// Queued operations whose last attempt failed
    pub async fn failed_operations(&self) -> Result<Vec<PendingOperation>, SyncError> {
        Ok(self.store.failed_operations().await?)
    }

    /// Allow or forbid drains, e.g. while signed out
    pub fn set_sync_eligible(&self, eligible: bool) {
        self.eligible.store(eligible, Ordering::SeqCst);
    }

    pub fn is_sync_eligible(&self) -> bool {
        self.eligible.load(Ordering::SeqCst)
    }

    /// Whether a drain is running right now
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    async fn automatic_drain(&self) {
        match self.drain_queue().await {
            Ok(report) if report.coalesced => tracing::debug!("Automatic drain coalesced with a running drain"),
            Ok(report) => tracing::info!(
                "Automatic drain finished: {} succeeded, {} failed",
                report.succeeded,
                report.failed
            ),
            Err(e) => tracing::error!("Automatic drain failed: {}", e),
        }
    }

    async fn drain(&self, mode: DrainMode) -> Result<DrainReport, SyncError> {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            tracing::debug!("Drain already in flight; request coalesced");
            return Ok(DrainReport::coalesced());
        };

        if self.monitor.is_offline() || !self.is_sync_eligible() {
            tracing::debug!("Drain skipped: offline or not eligible");
            return Ok(DrainReport::skipped());
        }

        self.update_status(|status| status.state = SyncState::Syncing);
        tracing::info!("Drain started ({:?})", mode);

        let outcome = self.run_passes(mode).await;
        let last_failed = match &outcome {
            Ok((_, last_failed)) => *last_failed,
            Err(_) => true,
        };
        self.finish(last_failed).await;

        let (report, _) = outcome?;
        tracing::info!(
            "Drain finished: {} succeeded, {} failed, {} deferred, {} blocked",
            report.succeeded,
            report.failed,
            report.deferred,
            report.blocked
        );
        Ok(report)
    }

    /// Process the queue until a pass finds nothing new
    async fn run_passes(&self, mode: DrainMode) -> Result<(DrainReport, bool), SyncError> {
        let mut report = DrainReport::default();
        let mut blocked: HashSet<OperationKey> = HashSet::new();
        let mut last_failed = false;
        let mut high_water = 0;

        loop {
            let batch = self.store.pending_operations_after(high_water).await?;
            let Some(last) = batch.last() else {
                break;
            };
            high_water = last.seq;

            let mut pass = DrainReport::default();
            for operation in batch {
                let key = operation.key();
                if blocked.contains(&key) {
                    pass.blocked += 1;
                    continue;
                }
                if mode == DrainMode::Automatic && !self.may_attempt(&operation) {
                    blocked.insert(key);
                    pass.deferred += 1;
                    continue;
                }

                if self.attempt(&operation).await? {
                    pass.succeeded += 1;
                    last_failed = false;
                } else {
                    blocked.insert(key);
                    pass.failed += 1;
                    last_failed = true;
                }
                self.publish_pending().await;
            }
            report.absorb(pass);
        }

        Ok((report, last_failed))
    }

    fn may_attempt(&self, operation: &PendingOperation) -> bool {
        !operation.rejected && self.backoff.is_due(operation, Utc::now())
    }

    /// Send one operation; `Ok(false)` when the remote refused it
    async fn attempt(&self, operation: &PendingOperation) -> Result<bool, SyncError> {
        match self.remote.apply(operation).await {
            Ok(response) => {
                self.store.remove_operation(&operation.operation_id).await?;
                if let Err(e) = reconcile(&self.store, operation, &response).await {
                    tracing::warn!(
                        "Synced {} on {} but could not update the cache: {}",
                        operation.kind,
                        operation.table,
                        e
                    );
                }

                let now = Utc::now();
                if let Err(e) = self.store.set_last_sync_time(now).await {
                    tracing::warn!("Failed to persist last sync time: {}", e);
                }
                self.update_status(|status| status.last_sync_time = Some(now));
                tracing::debug!("Synced operation {}", operation.operation_id);
                Ok(true)
            }
            Err(error) => {
                tracing::warn!(
                    "Operation {} ({} on {}) failed: {}",
                    operation.operation_id,
                    operation.kind,
                    operation.table,
                    error
                );
                self.store
                    .record_operation_failure(&operation.operation_id, &error.to_string(), !error.is_retryable())
                    .await?;
                Ok(false)
            }
        }
    }

    async fn publish_pending(&self) {
        match self.store.count_pending_operations().await {
            Ok(pending_count) => {
                self.update_status(|status| status.pending_count = pending_count);
            }
            Err(e) => tracing::warn!("Failed to count pending operations: {}", e),
        }
    }

    async fn finish(&self, last_failed: bool) {
        let pending_count = match self.store.count_pending_operations().await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::error!("Failed to count pending operations: {}", e);
                None
            }
        };

        self.update_status(|status| {
            if let Some(count) = pending_count {
                status.pending_count = count;
            }
            status.state = if status.pending_count == 0 {
                SyncState::Idle
            } else if last_failed {
                SyncState::Error
            } else {
                SyncState::Idle
            };
        });
    }

    /// Apply `change` and notify subscribers outside the lock
    fn update_status(&self, change: impl FnOnce(&mut SyncStatus)) -> SyncStatus {
        let snapshot = {
            let mut status = self.lock_status();
            change(&mut status);
            status.clone()
        };
        self.listeners.notify(&snapshot);
        snapshot
    }

    fn lock_status(&self) -> MutexGuard<'_, SyncStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
