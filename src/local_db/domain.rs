//! # Business Domain Records
//!
//! Typed views over the cached business tables. Only the id is required;
//! known fields are type-checked when present and every other column is
//! carried through untouched in `fields`.

use crate::local_db::registry::DomainRecord;
use crate::local_db::{LocalDatabase, Result};
use crate::shared::StoreError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Accept string or integer primary keys
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) if !id.is_empty() => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {}", other))),
    }
}

/// Point-of-sale product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Customer of a shop, rental desk or repair counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Enrolled student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// School class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolClass {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Completed sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

macro_rules! domain_record {
    ($ty:ty, $table:literal) => {
        impl DomainRecord for $ty {
            const TABLE: &'static str = $table;

            fn record_id(&self) -> String {
                self.id.clone()
            }
        }
    };
}

domain_record!(Product, "products");
domain_record!(Customer, "customers");
domain_record!(Student, "students");
domain_record!(SchoolClass, "classes");
domain_record!(Sale, "sales");

impl LocalDatabase {
    /// Cache typed records under `T::TABLE`
    pub async fn save_typed<T: DomainRecord>(&self, tenant_id: &str, records: &[T]) -> Result<usize> {
        let payloads = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.save_records(T::TABLE, tenant_id, &payloads).await
    }

    /// Read cached rows of `T::TABLE` as typed records
    pub async fn get_typed<T: DomainRecord>(&self, tenant_id: &str) -> Result<Vec<T>> {
        self.get_records(T::TABLE, tenant_id)
            .await?
            .into_iter()
            .map(|record| {
                serde_json::from_value(record.payload)
                    .map_err(|e| StoreError::corrupt(T::TABLE, format!("{}: {}", record.id, e)))
            })
            .collect()
    }

    pub async fn save_products(&self, tenant_id: &str, products: &[Product]) -> Result<usize> {
        self.save_typed(tenant_id, products).await
    }

    pub async fn get_products(&self, tenant_id: &str) -> Result<Vec<Product>> {
        self.get_typed(tenant_id).await
    }

    pub async fn save_customers(&self, tenant_id: &str, customers: &[Customer]) -> Result<usize> {
        self.save_typed(tenant_id, customers).await
    }

    pub async fn get_customers(&self, tenant_id: &str) -> Result<Vec<Customer>> {
        self.get_typed(tenant_id).await
    }

    pub async fn save_students(&self, tenant_id: &str, students: &[Student]) -> Result<usize> {
        self.save_typed(tenant_id, students).await
    }

    pub async fn get_students(&self, tenant_id: &str) -> Result<Vec<Student>> {
        self.get_typed(tenant_id).await
    }

    pub async fn save_classes(&self, tenant_id: &str, classes: &[SchoolClass]) -> Result<usize> {
        self.save_typed(tenant_id, classes).await
    }

    pub async fn get_classes(&self, tenant_id: &str) -> Result<Vec<SchoolClass>> {
        self.get_typed(tenant_id).await
    }

    pub async fn save_sales(&self, tenant_id: &str, sales: &[Sale]) -> Result<usize> {
        self.save_typed(tenant_id, sales).await
    }

    pub async fn get_sales(&self, tenant_id: &str) -> Result<Vec<Sale>> {
        self.get_typed(tenant_id).await
    }
}
