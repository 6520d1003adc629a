use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::value_objects::{
    credit_cards::{CreditCard, CreditCardHolderInfo},
    enums::{
        billing_cycles::BillingCycle, billing_types::BillingType,
        subscription_statuses::SubscriptionStatus,
    },
};

/// Local mirror of a gateway subscription, also used as the create/update body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_type: Option<BillingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<BillingCycle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Card-charged subscription body. Either `credit_card` or `credit_card_token`
/// must be present.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCcRequest {
    #[serde(flatten)]
    pub subscription: SubscriptionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card: Option<CreditCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card_holder_info: Option<CreditCardHolderInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card_token: Option<String>,
    pub remote_ip: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PaymentBookQuery {
    pub month: u32,
    pub year: i32,
}

/// Saga marker persisted on the owner under `subscriptionBindings.<id>` while a
/// subscription is being bound to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingBinding {
    pub subscription: SubscriptionRecord,
    pub bound_at_gateway: bool,
}
