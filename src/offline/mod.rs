//! # Offline Operations
//!
//! Building blocks the sync manager uses to replay writes made while the
//! remote was out of reach.
//!
//! ## Key Components
//!
//! - `queue.rs`: Pending operation types and ordering keys
//! - `retry.rs`: Backoff strategies for automatic drains
//! - `reconciliation.rs`: Cache updates after the remote accepts a write
//!
//! Persistence of the queue itself lives in `local_db::sync`.

pub mod queue;
pub mod retry;
pub mod reconciliation;

pub use queue::{record_id_of, OperationKey, OperationKind, PendingOperation};
pub use reconciliation::{reconcile, ReconciliationOutcome};
pub use retry::BackoffStrategy;
