//! # Local Database Module
//!
//! Durable, tenant-scoped local storage for the offline core, backed by SQLite.
//!
//! ## Architecture
//!
//! - **Record cache** (`records.rs`): last-fetched snapshot of remote rows,
//!   keyed by `(table, tenant, id)`, plus speculative local edits tagged as
//!   needing sync
//! - **Table registry** (`registry.rs`): typed handlers per business table
//! - **Domain wrappers** (`domain.rs`): products, customers, students,
//!   classes and sales
//! - **Pending queue** (`sync.rs`): the durable queue of deferred writes and
//!   sync metadata
//!
//! Every query is scoped to a single tenant; nothing here reads across
//! tenants.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tenantdesk_offline::local_db::LocalDatabase;
//!
//! # async fn example() -> Result<(), tenantdesk_offline::shared::StoreError> {
//! let db = LocalDatabase::open_at("/tmp/tenantdesk.db").await?;
//!
//! db.save_records("products", "shop-1", &[json!({"id": "p-1", "name": "Tea"})]).await?;
//! let products = db.get_records("products", "shop-1").await?;
//! assert_eq!(products.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod schema;
pub mod registry;
pub mod records;
pub mod domain;
pub mod sync;

pub use domain::{Customer, Product, Sale, SchoolClass, Student};
pub use records::CachedRecord;
pub use registry::{DomainRecord, TableHandler, TableRegistry};

use crate::shared::{OfflineConfig, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Result type for local database operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Local database connection manager
///
/// Owns the SQLite pool and the table registry used to validate cached
/// payloads. Construct once per installation and share it behind an `Arc`.
#[derive(Debug)]
pub struct LocalDatabase {
    pool: SqlitePool,
    registry: TableRegistry,
}

impl LocalDatabase {
    /// Open the database at the configured location
    pub async fn open(config: &OfflineConfig) -> Result<Self> {
        Self::open_at(config.database_path()).await
    }

    /// Open or create a database file
    ///
    /// Uses WAL mode so readers are not blocked by the sync manager's writes.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::debug!("Opened local database at {}", path.display());
        Self::with_pool(pool).await
    }

    /// Open a private in-memory database
    ///
    /// Data lives as long as the returned value; a single connection keeps
    /// the pool from handing out separate empty databases.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let db = Self {
            pool,
            registry: TableRegistry::business_defaults(),
        };
        db.init_schema().await?;
        Ok(db)
    }

    /// Replace the table registry
    pub fn with_registry(mut self, registry: TableRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Table registry used to validate payloads
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(schema::SCHEMA_SQL).execute(&self.pool).await?;
        self.run_migrations().await
    }

    /// Run database migrations
    ///
    /// Checks the current schema version and applies any pending migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version: (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;

        if !schema::needs_migration(current_version.0) {
            return Ok(());
        }

        for version in schema::get_pending_migrations(current_version.0) {
            // Version 1 is the base schema applied above.
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;
            tracing::info!("Applied local schema migration {}", version);
        }

        Ok(())
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get database statistics
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let cached: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cached_records")
            .fetch_one(&self.pool)
            .await?;

        let unsynced: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM cached_records WHERE needs_sync = 1")
                .fetch_one(&self.pool)
                .await?;

        let pending: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_operations")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            cached_records: cached.0 as u64,
            unsynced_records: unsynced.0 as u64,
            pending_operations: pending.0 as u64,
        })
    }

    /// Close the pool, flushing WAL contents
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Rows in the record cache across all tenants
    pub cached_records: u64,
    /// Cached rows carrying a local edit not yet confirmed by the remote
    pub unsynced_records: u64,
    /// Queued deferred writes
    pub pending_operations: u64,
}
