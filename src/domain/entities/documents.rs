use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::{Map, Value};

use crate::domain::value_objects::enums::owner_statuses::OwnerStatus;
use crate::infra::db::postgres::schema::documents;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = documents, primary_key(path))]
pub struct DocumentEntity {
    pub path: String,
    pub collection: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = documents)]
pub struct UpsertDocumentEntity {
    pub path: String,
    pub collection: String,
    pub data: Value,
}

/// A document as read from the record store: its full path and its fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSnapshot {
    pub path: String,
    pub data: Map<String, Value>,
}

impl DocumentSnapshot {
    pub fn new(path: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// The array stored under `field`, or `None` when the field is absent or
    /// not an array.
    pub fn list(&self, field: &str) -> Option<Vec<Value>> {
        match self.data.get(field) {
            Some(Value::Array(items)) => Some(items.clone()),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<OwnerStatus> {
        self.data
            .get("status")
            .and_then(Value::as_str)
            .and_then(OwnerStatus::from_str)
    }
}

impl From<DocumentEntity> for DocumentSnapshot {
    fn from(entity: DocumentEntity) -> Self {
        let data = match entity.data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            path: entity.path,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_is_none_for_missing_or_non_array_fields() {
        let snapshot = DocumentSnapshot::new(
            "clients/c1",
            json!({ "payments": [{ "id": "pay_1" }], "subscriptions": "broken" })
                .as_object()
                .cloned()
                .unwrap(),
        );

        assert_eq!(snapshot.list("payments").map(|items| items.len()), Some(1));
        assert!(snapshot.list("subscriptions").is_none());
        assert!(snapshot.list("invoices").is_none());
    }

    #[test]
    fn status_reads_owner_status() {
        let snapshot = DocumentSnapshot::new(
            "clients/c1",
            json!({ "status": "canceled" }).as_object().cloned().unwrap(),
        );
        assert_eq!(snapshot.status(), Some(OwnerStatus::Canceled));
    }
}
