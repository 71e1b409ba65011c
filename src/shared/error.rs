//! Shared Error Types
//!
//! Error types for every layer of the offline core.
//!
//! # Error Categories
//!
//! - `StoreError` - Local durable storage failures (non-fatal to callers)
//! - `RemoteError` - Failures reported by the remote API, classified as
//!   retryable or permanently rejected
//! - `SyncError` - Failures of sync manager operations
//! - `AdapterError` - Failures surfaced by the query and mutation adapters
//!
//! # Usage
//!
//! ```rust
//! use tenantdesk_offline::shared::error::RemoteError;
//!
//! let err = RemoteError::rejected(409, "duplicate key value violates unique constraint");
//! assert!(!err.is_retryable());
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync`.
use thiserror::Error;

/// Local store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error from sqlx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The record has no usable `id` field
    #[error("Record for table '{table}' has no id")]
    MissingRecordId {
        /// Table the record was addressed to
        table: String,
    },

    /// The payload does not match the shape registered for its table
    #[error("Invalid record for table '{table}': {message}")]
    InvalidRecord {
        /// Table the record was addressed to
        table: String,
        /// Human-readable error message
        message: String,
    },

    /// A stored row could not be decoded
    #[error("Corrupt row in '{table}': {message}")]
    Corrupt {
        /// Storage table holding the row
        table: String,
        /// Human-readable error message
        message: String,
    },

    /// Filesystem error while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a missing-id error
    pub fn missing_id(table: impl Into<String>) -> Self {
        Self::MissingRecordId {
            table: table.into(),
        }
    }

    /// Create an invalid-record error
    pub fn invalid(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a corrupt-row error
    pub fn corrupt(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Remote API errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RemoteError {
    /// The remote could not be reached at all
    #[error("Remote unreachable: {message}")]
    Unreachable {
        /// Human-readable error message
        message: String,
    },

    /// The remote failed in a way that may succeed later (timeouts, 5xx, 429)
    #[error("Transient remote failure: {message}")]
    Transient {
        /// Human-readable error message
        message: String,
    },

    /// The remote refused the request for a permanent reason (validation,
    /// constraint violation, permissions)
    #[error("Remote rejected request ({status}): {message}")]
    Rejected {
        /// HTTP-style status code reported by the remote
        status: u16,
        /// Human-readable error message
        message: String,
    },

    /// The remote answered with a body we could not understand
    #[error("Could not decode remote response: {message}")]
    Decode {
        /// Human-readable error message
        message: String,
    },
}

impl RemoteError {
    /// Create an unreachable error
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    /// Create a transient error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create a permanent rejection
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Sync manager errors
#[derive(Debug, Error)]
pub enum SyncError {
    /// The durable queue could not be written or read
    #[error("Sync storage error: {0}")]
    Storage(#[from] StoreError),

    /// No pending operation with that id
    #[error("No pending operation {0}")]
    UnknownOperation(uuid::Uuid),

    /// Auto sync was started outside a tokio runtime
    #[error("Auto sync requires a running tokio runtime")]
    NoRuntime,
}

/// Adapter errors
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The remote call failed and no offline path could stand in for it
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Offline query with no offline function and no cached snapshot
    #[error("No offline data available for '{table}'")]
    NoOfflineData {
        /// Table the query addressed
        table: String,
    },

    /// Offline mutation with no offline function or no cache key
    #[error("Cannot perform '{operation}' offline")]
    OfflineUnavailable {
        /// Short description of the attempted operation
        operation: String,
    },

    /// The caller-supplied offline function failed
    #[error("Offline handler failed: {message}")]
    OfflineHandler {
        /// Human-readable error message
        message: String,
    },

    /// The operation could not be queued for later sync
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl AdapterError {
    /// Create a no-offline-data error
    pub fn no_offline_data(table: impl Into<String>) -> Self {
        Self::NoOfflineData {
            table: table.into(),
        }
    }

    /// Create an offline-unavailable error
    pub fn offline_unavailable(operation: impl Into<String>) -> Self {
        Self::OfflineUnavailable {
            operation: operation.into(),
        }
    }

    /// Create an offline-handler error
    pub fn offline_handler(message: impl Into<String>) -> Self {
        Self::OfflineHandler {
            message: message.into(),
        }
    }
}
