use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::entities::documents::DocumentSnapshot;

/// Equality predicate on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

/// Path-addressed document store. Paths are `<collection>/<documentId>`.
/// Every write is a shallow merge: top-level fields in `fields` replace the
/// stored ones, the rest of the document is left alone.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<DocumentSnapshot>>;
    async fn set_merge(&self, path: &str, fields: Map<String, Value>) -> Result<()>;
    async fn query(&self, collection: &str, filters: Vec<FieldFilter>)
    -> Result<Vec<DocumentSnapshot>>;
    /// Inserts a new document under a generated id and returns the id.
    async fn add(&self, collection: &str, fields: Map<String, Value>) -> Result<String>;
}
