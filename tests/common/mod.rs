//! Common test utilities and helpers
//!
//! - `MockRemote`: scriptable in-process `RemoteApi`
//! - `Harness`: store, monitor, sync manager and adapters wired together

pub mod mock_remote;

pub use mock_remote::{MockRemote, RemoteCall};

use std::sync::Arc;
use std::time::Duration;
use tenantdesk_offline::adapters::OfflineAdapters;
use tenantdesk_offline::local_db::LocalDatabase;
use tenantdesk_offline::offline::BackoffStrategy;
use tenantdesk_offline::shared::OfflineConfig;
use tenantdesk_offline::sync::{NetworkMonitor, SyncManager};

pub const TENANT: &str = "shop-1";

/// Every offline-core service over an in-memory store
pub struct Harness {
    pub store: Arc<LocalDatabase>,
    pub monitor: Arc<NetworkMonitor>,
    pub remote: Arc<MockRemote>,
    pub sync: Arc<SyncManager>,
    pub adapters: OfflineAdapters,
}

impl Harness {
    /// Online harness with retry throttling disabled
    pub async fn new() -> Self {
        Self::with_remote(MockRemote::new()).await
    }

    pub async fn with_remote(remote: MockRemote) -> Self {
        let store = Arc::new(LocalDatabase::in_memory().await.expect("in-memory store"));
        let monitor = Arc::new(NetworkMonitor::default());
        let remote = Arc::new(remote);
        let sync = Arc::new(
            SyncManager::new(store.clone(), remote.clone(), monitor.clone(), &OfflineConfig::default())
                .with_backoff(BackoffStrategy::None),
        );
        let adapters = OfflineAdapters::new(monitor.clone(), store.clone(), sync.clone());

        Self {
            store,
            monitor,
            remote,
            sync,
            adapters,
        }
    }

    pub fn go_offline(&self) {
        self.monitor.set_online(false);
    }

    pub fn go_online(&self) {
        self.monitor.set_online(true);
    }

    /// Wait until no drain is running and the queue holds `pending` operations
    pub async fn settle(&self, pending: usize) {
        for _ in 0..200 {
            if !self.sync.is_draining() && self.sync.get_status().pending_count == pending {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "sync never settled at {} pending (status: {:?})",
            pending,
            self.sync.get_status()
        );
    }
}
