use serde::Deserialize;

use crate::domain::value_objects::{
    enums::webhook_events::WebhookEventType, payments::PaymentRecord,
};

/// Body of a gateway payment callback.
#[derive(Debug, Clone, Deserialize)]
pub struct AsaasPaymentWebhook {
    pub id: String,
    pub event: WebhookEventType,
    #[serde(default)]
    pub payment: Option<PaymentRecord>,
}
