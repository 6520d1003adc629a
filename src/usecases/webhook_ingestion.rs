use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    domain::{
        entities::asaas_webhooks::ProcessedWebhookEvent,
        repositories::{record_store::RecordStore, webhook_ledger::WebhookLedger},
        value_objects::{
            asaas_webhooks::AsaasPaymentWebhook, external_reference::ExternalReference,
        },
    },
    usecases::reconciliation::{ReconcileError, ReconciliationEngine},
};

/// Terminal state of one delivery. Every variant is a success for the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Deduped,
    Unlinked,
    Unrecognized,
    Processed,
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook ledger unavailable: {0}")]
    Ledger(anyhow::Error),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::Reconcile(err) => err.status_code(),
        }
    }
}

pub struct WebhookIngestion<S, L>
where
    S: RecordStore + ?Sized,
    L: WebhookLedger + ?Sized,
{
    engine: ReconciliationEngine<S>,
    ledger: Arc<L>,
}

impl<S, L> WebhookIngestion<S, L>
where
    S: RecordStore + ?Sized + 'static,
    L: WebhookLedger + ?Sized,
{
    pub fn new(engine: ReconciliationEngine<S>, ledger: Arc<L>) -> Self {
        Self { engine, ledger }
    }

    pub async fn ingest(
        &self,
        webhook: AsaasPaymentWebhook,
    ) -> Result<WebhookOutcome, WebhookError> {
        let event_id = webhook.id.clone();

        if self.already_processed(&event_id).await? {
            info!(%event_id, "asaas_webhook: duplicate delivery skipped");
            return Ok(WebhookOutcome::Deduped);
        }

        let Some(payment) = webhook.payment else {
            info!(%event_id, event = %webhook.event, "asaas_webhook: no payment in delivery");
            return Ok(WebhookOutcome::Unlinked);
        };
        let Some(raw_reference) = payment
            .external_reference
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
        else {
            info!(
                %event_id,
                event = %webhook.event,
                "asaas_webhook: payment has no external reference"
            );
            return Ok(WebhookOutcome::Unlinked);
        };
        let reference = match ExternalReference::parse(raw_reference) {
            Ok(reference) => reference,
            Err(err) => {
                warn!(
                    %event_id,
                    reference = raw_reference,
                    error = %err,
                    "asaas_webhook: unroutable external reference dropped"
                );
                return Ok(WebhookOutcome::Unlinked);
            }
        };

        let owner = reference.owner().clone();
        let _guard = self.engine.lock_owner(&owner).await;

        // A duplicate delivered concurrently may have finished while we waited.
        if self.already_processed(&event_id).await? {
            info!(%event_id, %owner, "asaas_webhook: duplicate delivery skipped");
            return Ok(WebhookOutcome::Deduped);
        }

        if self.engine.find_owner(&owner).await?.is_none() {
            info!(%event_id, %owner, "asaas_webhook: owner document not found; delivery dropped");
            return Ok(WebhookOutcome::Unrecognized);
        }

        let mode = webhook.event.update_mode();
        let payment_json = serde_json::to_value(&payment)
            .map_err(|err| ReconcileError::Internal(err.into()))?;

        self.engine
            .apply_payment_update_locked(&reference, payment, mode)
            .await
            .map_err(|err| {
                error!(
                    %event_id,
                    %owner,
                    %mode,
                    error = ?err,
                    "asaas_webhook: failed to apply payment update"
                );
                err
            })?;

        self.ledger
            .append(ProcessedWebhookEvent {
                event_id: event_id.clone(),
                event: webhook.event.to_string(),
                payment: payment_json,
                collection: owner.collection().to_string(),
                reference: owner.to_string(),
                created_at: Utc::now(),
            })
            .await
            .map_err(|err| {
                error!(
                    %event_id,
                    %owner,
                    db_error = ?err,
                    "asaas_webhook: failed to record processed event"
                );
                WebhookError::Ledger(err)
            })?;

        info!(
            %event_id,
            %owner,
            event = %webhook.event,
            %mode,
            "asaas_webhook: delivery processed"
        );
        Ok(WebhookOutcome::Processed)
    }

    async fn already_processed(&self, event_id: &str) -> Result<bool, WebhookError> {
        self.ledger
            .find(event_id)
            .await
            .map(|entry| entry.is_some())
            .map_err(|err| {
                error!(%event_id, db_error = ?err, "asaas_webhook: failed to read ledger");
                WebhookError::Ledger(err)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            entities::asaas_webhooks::ASAAS_WEBHOOKS_COLLECTION,
            repositories::{record_store::FieldFilter, webhook_ledger::MockWebhookLedger},
        },
        infra::{memory::record_store::InMemoryRecordStore, webhook_ledger::DocumentWebhookLedger},
        usecases::{owner_locks::OwnerLocks, reconciliation::ReconcileSettings},
    };
    use anyhow::anyhow;
    use serde_json::{Value, json};

    type Ingestion =
        WebhookIngestion<InMemoryRecordStore, DocumentWebhookLedger<InMemoryRecordStore>>;

    async fn setup(owner: Option<Value>) -> (Arc<InMemoryRecordStore>, Ingestion) {
        let store = Arc::new(InMemoryRecordStore::new());
        if let Some(owner) = owner {
            store
                .set_merge("clients/c1", owner.as_object().cloned().unwrap())
                .await
                .unwrap();
        }
        let engine = ReconciliationEngine::new(
            Arc::clone(&store),
            Arc::new(OwnerLocks::new()),
            ReconcileSettings::default(),
        );
        let ledger = Arc::new(DocumentWebhookLedger::new(Arc::clone(&store)));
        (store, WebhookIngestion::new(engine, ledger))
    }

    fn delivery(event_id: &str, event: &str, payment: Value) -> AsaasPaymentWebhook {
        serde_json::from_value(json!({ "id": event_id, "event": event, "payment": payment }))
            .unwrap()
    }

    async fn ledger_entries(store: &InMemoryRecordStore) -> usize {
        store
            .query(ASAAS_WEBHOOKS_COLLECTION, Vec::<FieldFilter>::new())
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn duplicate_delivery_is_processed_once() {
        let (store, ingestion) = setup(Some(json!({ "name": "Ana" }))).await;
        let webhook = delivery(
            "evt_1",
            "PAYMENT_CREATED",
            json!({ "id": "pay_1", "status": "PENDING", "externalReference": "clients/c1/payments/pay_1" }),
        );

        assert_eq!(ingestion.ingest(webhook.clone()).await.unwrap(), WebhookOutcome::Processed);
        assert_eq!(ingestion.ingest(webhook).await.unwrap(), WebhookOutcome::Deduped);

        let owner = store.get("clients/c1").await.unwrap().unwrap();
        assert_eq!(owner.list("payments").unwrap().len(), 1);
        assert_eq!(ledger_entries(&store).await, 1);
    }

    #[tokio::test]
    async fn concurrent_duplicates_are_processed_once() {
        let (store, ingestion) = setup(Some(json!({}))).await;
        let ingestion = Arc::new(ingestion);
        let webhook = delivery(
            "evt_1",
            "PAYMENT_CREATED",
            json!({ "id": "pay_1", "status": "PENDING", "externalReference": "clients/c1/payments/pay_1" }),
        );

        let first = tokio::spawn({
            let ingestion = Arc::clone(&ingestion);
            let webhook = webhook.clone();
            async move { ingestion.ingest(webhook).await.unwrap() }
        });
        let second = tokio::spawn({
            let ingestion = Arc::clone(&ingestion);
            async move { ingestion.ingest(webhook).await.unwrap() }
        });

        let mut outcomes = vec![first.await.unwrap(), second.await.unwrap()];
        outcomes.sort_by_key(|outcome| *outcome == WebhookOutcome::Processed);
        assert_eq!(outcomes, vec![WebhookOutcome::Deduped, WebhookOutcome::Processed]);
        assert_eq!(ledger_entries(&store).await, 1);
    }

    #[tokio::test]
    async fn unlinked_payment_changes_nothing() {
        let (store, ingestion) = setup(Some(json!({ "name": "Ana" }))).await;
        let webhook = delivery("evt_1", "PAYMENT_RECEIVED", json!({ "id": "pay_1", "status": "RECEIVED" }));

        assert_eq!(ingestion.ingest(webhook).await.unwrap(), WebhookOutcome::Unlinked);

        let owner = store.get("clients/c1").await.unwrap().unwrap();
        assert_eq!(Value::Object(owner.data), json!({ "name": "Ana" }));
        assert_eq!(ledger_entries(&store).await, 0);
    }

    #[tokio::test]
    async fn malformed_reference_is_dropped() {
        let (store, ingestion) = setup(Some(json!({}))).await;
        let webhook = delivery(
            "evt_1",
            "PAYMENT_RECEIVED",
            json!({ "id": "pay_1", "externalReference": "order-42" }),
        );

        assert_eq!(ingestion.ingest(webhook).await.unwrap(), WebhookOutcome::Unlinked);
        assert_eq!(ledger_entries(&store).await, 0);
    }

    #[tokio::test]
    async fn unknown_owner_is_dropped_without_ledger_entry() {
        let (store, ingestion) = setup(None).await;
        let webhook = delivery(
            "evt_1",
            "PAYMENT_CREATED",
            json!({ "id": "pay_1", "externalReference": "clients/c1/payments/pay_1" }),
        );

        assert_eq!(ingestion.ingest(webhook).await.unwrap(), WebhookOutcome::Unrecognized);
        assert!(store.get("clients/c1").await.unwrap().is_none());
        assert_eq!(ledger_entries(&store).await, 0);
    }

    #[tokio::test]
    async fn events_dispatch_to_create_update_and_delete() {
        let (store, ingestion) = setup(Some(json!({}))).await;
        let reference = "clients/c1/payments/pay_1";

        ingestion
            .ingest(delivery(
                "evt_1",
                "PAYMENT_CREATED",
                json!({ "id": "pay_1", "status": "PENDING", "externalReference": reference }),
            ))
            .await
            .unwrap();
        ingestion
            .ingest(delivery(
                "evt_2",
                "PAYMENT_OVERDUE",
                json!({ "id": "pay_1", "status": "OVERDUE", "externalReference": reference }),
            ))
            .await
            .unwrap();

        let owner = store.get("clients/c1").await.unwrap().unwrap();
        assert_eq!(owner.list("payments").unwrap()[0]["status"], json!("OVERDUE"));
        assert_eq!(owner.data["status"], json!("overdue"));

        ingestion
            .ingest(delivery(
                "evt_3",
                "PAYMENT_DELETED",
                json!({ "id": "pay_1", "status": "OVERDUE", "externalReference": reference }),
            ))
            .await
            .unwrap();

        let owner = store.get("clients/c1").await.unwrap().unwrap();
        assert_eq!(owner.list("payments"), Some(Vec::new()));
        assert_eq!(owner.data["status"], json!("active"));
        assert_eq!(ledger_entries(&store).await, 3);
    }

    #[tokio::test]
    async fn failed_update_leaves_no_ledger_entry() {
        let (store, ingestion) = setup(Some(json!({}))).await;
        let webhook = delivery(
            "evt_1",
            "PAYMENT_RECEIVED",
            json!({ "status": "RECEIVED", "externalReference": "clients/c1/payments/pay_1" }),
        );

        let err = ingestion.ingest(webhook).await.unwrap_err();
        assert!(matches!(
            err,
            WebhookError::Reconcile(ReconcileError::MissingReference("id"))
        ));
        assert_eq!(ledger_entries(&store).await, 0);
    }

    #[tokio::test]
    async fn ledger_outage_is_reported_as_server_error() {
        let store = Arc::new(InMemoryRecordStore::new());
        let engine = ReconciliationEngine::new(
            store,
            Arc::new(OwnerLocks::new()),
            ReconcileSettings::default(),
        );
        let mut ledger = MockWebhookLedger::new();
        ledger
            .expect_find()
            .returning(|_| Err(anyhow!("connection refused")));
        ledger.expect_append().never();

        let ingestion = WebhookIngestion::new(engine, Arc::new(ledger));
        let err = ingestion
            .ingest(delivery("evt_1", "PAYMENT_CREATED", json!({ "id": "pay_1" })))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
