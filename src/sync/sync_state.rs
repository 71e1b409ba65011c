//! # Sync State
//!
//! Status published by the sync manager.
//!
//! ## Features
//!
//! - **State Tracking**: Idle, syncing or stuck on an error
//! - **Queue Depth**: Pending operation count after each change
//! - **Drain Reports**: What a single drain did

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sync manager activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    /// The most recent remote attempt failed and operations remain queued
    Error,
}

/// Snapshot of the sync manager's state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Operations still in the queue
    pub pending_count: usize,
    /// Time of the most recent successful remote write
    pub last_sync_time: Option<DateTime<Utc>>,
}

impl SyncStatus {
    pub fn is_syncing(&self) -> bool {
        self.state == SyncState::Syncing
    }

    /// Nothing left to push
    pub fn is_settled(&self) -> bool {
        self.state == SyncState::Idle && self.pending_count == 0
    }
}

/// Outcome of one drain request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrainReport {
    /// Operations accepted by the remote and removed from the queue
    pub succeeded: usize,
    /// Operations attempted and failed
    pub failed: usize,
    /// Operations skipped for backoff or an earlier rejection
    pub deferred: usize,
    /// Operations skipped behind an unfinished operation with the same key
    pub blocked: usize,
    /// Another drain was already running; nothing was done
    pub coalesced: bool,
    /// Offline or not eligible; nothing was attempted
    pub skipped_offline: bool,
}

impl DrainReport {
    pub(crate) fn coalesced() -> Self {
        Self {
            coalesced: true,
            ..Self::default()
        }
    }

    pub(crate) fn skipped() -> Self {
        Self {
            skipped_offline: true,
            ..Self::default()
        }
    }

    /// Operations the drain looked at
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Merge the counters of a later pass into this report
    pub(crate) fn absorb(&mut self, other: DrainReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.deferred += other.deferred;
        self.blocked += other.blocked;
    }
}
