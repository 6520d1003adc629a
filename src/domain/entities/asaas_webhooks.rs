use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ASAAS_WEBHOOKS_COLLECTION: &str = "asaas_webhooks";

/// Ledger row proving a gateway delivery was fully processed. Written once,
/// after the owner update succeeded, and never touched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedWebhookEvent {
    pub event_id: String,
    pub event: String,
    pub payment: Value,
    pub collection: String,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}
