//! Shared Module
//!
//! Types used by every layer of the offline core: error types, configuration
//! and the synchronous listener lists behind `subscribe` APIs.

/// Error types
pub mod error;

/// Configuration
pub mod config;

/// Subscriber fan-out
pub mod event;

pub use config::{ConfigError, OfflineConfig, OfflineConfigBuilder};
pub use error::{AdapterError, RemoteError, StoreError, SyncError};
pub use event::{Listeners, Subscription};
