use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    entities::documents::DocumentSnapshot,
    repositories::record_store::{FieldFilter, RecordStore},
    value_objects::external_reference::OwnerPath,
};

/// Process-local record store for local runs and tests. Documents live in a
/// `BTreeMap` keyed by path, so queries come back in path order.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    documents: RwLock<BTreeMap<String, Map<String, Value>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, path: &str) -> Result<Option<DocumentSnapshot>> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(path)
            .map(|data| DocumentSnapshot::new(path, data.clone())))
    }

    async fn set_merge(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        let owner = OwnerPath::parse(path)?;
        let mut documents = self.documents.write().await;
        documents.entry(owner.to_string()).or_default().extend(fields);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: Vec<FieldFilter>,
    ) -> Result<Vec<DocumentSnapshot>> {
        let documents = self.documents.read().await;
        let results = documents
            .iter()
            .filter(|(path, _)| {
                OwnerPath::parse(path)
                    .map(|owner| owner.collection() == collection)
                    .unwrap_or(false)
            })
            .filter(|(_, data)| {
                filters
                    .iter()
                    .all(|filter| data.get(&filter.field) == Some(&filter.value))
            })
            .map(|(path, data)| DocumentSnapshot::new(path.clone(), data.clone()))
            .collect();
        Ok(results)
    }

    async fn add(&self, collection: &str, fields: Map<String, Value>) -> Result<String> {
        let document_id = Uuid::new_v4().to_string();
        let owner = OwnerPath::new(collection, &document_id)?;
        self.documents.write().await.insert(owner.to_string(), fields);
        Ok(document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn set_merge_replaces_only_the_written_fields() {
        let store = InMemoryRecordStore::new();
        store
            .set_merge(
                "clients/c1",
                fields(json!({ "name": "Ana", "status": "active", "payments": [] })),
            )
            .await
            .unwrap();
        store
            .set_merge("clients/c1", fields(json!({ "status": "overdue" })))
            .await
            .unwrap();

        let snapshot = store.get("clients/c1").await.unwrap().unwrap();
        assert_eq!(snapshot.data["name"], json!("Ana"));
        assert_eq!(snapshot.data["status"], json!("overdue"));
        assert_eq!(snapshot.data["payments"], json!([]));
    }

    #[tokio::test]
    async fn query_filters_by_collection_and_field_equality() {
        let store = InMemoryRecordStore::new();
        store
            .add("asaas_webhooks", fields(json!({ "event_id": "evt_1" })))
            .await
            .unwrap();
        store
            .add("asaas_webhooks", fields(json!({ "event_id": "evt_2" })))
            .await
            .unwrap();
        store
            .set_merge("clients/c1", fields(json!({ "event_id": "evt_1" })))
            .await
            .unwrap();

        let hits = store
            .query("asaas_webhooks", vec![FieldFilter::eq("event_id", "evt_1")])
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits[0].path.starts_with("asaas_webhooks/"));
    }

    #[tokio::test]
    async fn writes_to_malformed_paths_are_rejected() {
        let store = InMemoryRecordStore::new();
        assert!(
            store
                .set_merge("clients/c1/payments", Map::new())
                .await
                .is_err()
        );
        assert!(store.is_empty().await);
    }
}
