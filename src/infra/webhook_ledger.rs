use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{
    entities::asaas_webhooks::{ASAAS_WEBHOOKS_COLLECTION, ProcessedWebhookEvent},
    repositories::{
        record_store::{FieldFilter, RecordStore},
        webhook_ledger::WebhookLedger,
    },
};

/// Processed-event ledger kept as a collection in the record store.
pub struct DocumentWebhookLedger<S>
where
    S: RecordStore + ?Sized,
{
    store: Arc<S>,
}

impl<S> DocumentWebhookLedger<S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> WebhookLedger for DocumentWebhookLedger<S>
where
    S: RecordStore + ?Sized + 'static,
{
    async fn find(&self, event_id: &str) -> Result<Option<ProcessedWebhookEvent>> {
        let hits = self
            .store
            .query(
                ASAAS_WEBHOOKS_COLLECTION,
                vec![FieldFilter::eq("event_id", event_id)],
            )
            .await?;

        match hits.into_iter().next() {
            Some(snapshot) => {
                let entry = serde_json::from_value(Value::Object(snapshot.data))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn append(&self, entry: ProcessedWebhookEvent) -> Result<()> {
        let fields = match serde_json::to_value(&entry)? {
            Value::Object(fields) => fields,
            other => return Err(anyhow!("ledger entry serialized to {other}")),
        };
        self.store.add(ASAAS_WEBHOOKS_COLLECTION, fields).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::record_store::InMemoryRecordStore;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn appended_entries_are_found_by_event_id() {
        let store = Arc::new(InMemoryRecordStore::new());
        let ledger = DocumentWebhookLedger::new(Arc::clone(&store));

        assert!(ledger.find("evt_1").await.unwrap().is_none());

        ledger
            .append(ProcessedWebhookEvent {
                event_id: "evt_1".to_string(),
                event: "PAYMENT_CREATED".to_string(),
                payment: json!({ "id": "pay_1" }),
                collection: "clients".to_string(),
                reference: "clients/c1".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let entry = ledger.find("evt_1").await.unwrap().unwrap();
        assert_eq!(entry.reference, "clients/c1");
        assert_eq!(store.len().await, 1);
    }
}
