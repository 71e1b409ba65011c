//! # Table Registry
//!
//! Routes cached payloads to a handler registered for their table. A typed
//! handler checks the payload against its domain record shape before it is
//! cached; tables without a registered handler only need an `id`.

use crate::offline::queue::record_id_of;
use crate::shared::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// A business record cached under a fixed table
pub trait DomainRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table identifier on the remote and in the cache
    const TABLE: &'static str;

    /// Primary key as stored in the cache
    fn record_id(&self) -> String;
}

/// Validates payloads for one table and extracts their ids
pub trait TableHandler: Send + Sync + std::fmt::Debug {
    /// Table this handler serves
    fn table(&self) -> &str;

    /// Check `payload` and return its record id
    fn record_id(&self, payload: &Value) -> Result<String, StoreError>;
}

/// Handler backed by a [`DomainRecord`] type
pub struct TypedTable<T>(PhantomData<fn() -> T>);

impl<T> TypedTable<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TypedTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DomainRecord> std::fmt::Debug for TypedTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypedTable({})", T::TABLE)
    }
}

impl<T: DomainRecord> TableHandler for TypedTable<T> {
    fn table(&self) -> &str {
        T::TABLE
    }

    fn record_id(&self, payload: &Value) -> Result<String, StoreError> {
        if record_id_of(payload).is_none() {
            return Err(StoreError::missing_id(T::TABLE));
        }
        let record: T = serde_json::from_value(payload.clone())
            .map_err(|e| StoreError::invalid(T::TABLE, e.to_string()))?;
        Ok(record.record_id())
    }
}

/// Handler for tables with no registered shape
#[derive(Debug)]
pub struct GenericTable {
    table: String,
}

impl GenericTable {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl TableHandler for GenericTable {
    fn table(&self) -> &str {
        &self.table
    }

    fn record_id(&self, payload: &Value) -> Result<String, StoreError> {
        if !payload.is_object() {
            return Err(StoreError::invalid(&self.table, "payload is not an object"));
        }
        record_id_of(payload).ok_or_else(|| StoreError::missing_id(&self.table))
    }
}

/// Map of table identifier to handler
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    handlers: HashMap<String, Arc<dyn TableHandler>>,
}

impl TableRegistry {
    /// Registry with no typed tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the TenantDesk business tables
    pub fn business_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<super::Product>();
        registry.register::<super::Customer>();
        registry.register::<super::Student>();
        registry.register::<super::SchoolClass>();
        registry.register::<super::Sale>();
        registry
    }

    /// Register the typed handler for `T::TABLE`
    pub fn register<T: DomainRecord>(&mut self) -> &mut Self {
        self.register_handler(Arc::new(TypedTable::<T>::new()))
    }

    /// Register a custom handler, replacing any previous one for its table
    pub fn register_handler(&mut self, handler: Arc<dyn TableHandler>) -> &mut Self {
        self.handlers.insert(handler.table().to_string(), handler);
        self
    }

    /// Handler for `table`, falling back to the generic id-only handler
    pub fn handler(&self, table: &str) -> Arc<dyn TableHandler> {
        match self.handlers.get(table) {
            Some(handler) => Arc::clone(handler),
            None => Arc::new(GenericTable::new(table)),
        }
    }

    pub fn is_registered(&self, table: &str) -> bool {
        self.handlers.contains_key(table)
    }

    /// Registered table identifiers, sorted
    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        tables.sort_unstable();
        tables
    }
}
