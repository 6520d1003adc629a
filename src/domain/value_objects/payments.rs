use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::value_objects::enums::{
    billing_types::BillingType, payment_statuses::PaymentStatus,
};

/// Local mirror of a gateway charge. Fields the gateway sends that are not
/// modelled here are carried in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_type: Option<BillingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_payment_extras: Option<ManualPaymentExtras>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Who recorded a cash payment by hand, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualPaymentExtras {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible: Option<Responsible>,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiation: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Responsible {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Folds a gateway-reported payment over the stored one. The incoming payload is
/// authoritative for every field it carries; fields it omits keep their stored
/// value. Cash-payment extras survive only while the merged status is
/// `RECEIVED_IN_CASH`.
pub fn merge_payment_record(incoming: PaymentRecord, stored: PaymentRecord) -> PaymentRecord {
    let mut extra = stored.extra;
    extra.extend(incoming.extra);

    let status = incoming.status.or(stored.status);
    let manual_payment_extras = match status {
        Some(PaymentStatus::ReceivedInCash) => incoming
            .manual_payment_extras
            .or(stored.manual_payment_extras),
        _ => None,
    };

    PaymentRecord {
        id: incoming.id.or(stored.id),
        customer: incoming.customer.or(stored.customer),
        subscription: incoming.subscription.or(stored.subscription),
        external_reference: incoming.external_reference.or(stored.external_reference),
        status,
        billing_type: incoming.billing_type.or(stored.billing_type),
        value: incoming.value.or(stored.value),
        net_value: incoming.net_value.or(stored.net_value),
        due_date: incoming.due_date.or(stored.due_date),
        payment_date: incoming.payment_date.or(stored.payment_date),
        description: incoming.description.or(stored.description),
        invoice_url: incoming.invoice_url.or(stored.invoice_url),
        manual_payment_extras,
        extra,
    }
}

/// One page of a gateway list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPage {
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub data: Vec<PaymentRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveInCashModel {
    pub payment_date: String,
    pub value: f64,
    pub notify_customer: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored_payment() -> PaymentRecord {
        serde_json::from_value(json!({
            "id": "pay_1",
            "status": "PENDING",
            "value": 100.0,
            "dueDate": "2024-05-10",
            "externalReference": "clients/c1/payments/pay_1",
            "bankSlipUrl": "https://example.test/slip"
        }))
        .unwrap()
    }

    #[test]
    fn incoming_fields_win_and_missing_fields_are_preserved() {
        let incoming = PaymentRecord {
            id: Some("pay_1".to_string()),
            status: Some(PaymentStatus::Overdue),
            value: Some(120.0),
            ..Default::default()
        };

        let merged = merge_payment_record(incoming, stored_payment());

        assert_eq!(merged.status, Some(PaymentStatus::Overdue));
        assert_eq!(merged.value, Some(120.0));
        assert_eq!(merged.due_date.as_deref(), Some("2024-05-10"));
        assert_eq!(
            merged.external_reference.as_deref(),
            Some("clients/c1/payments/pay_1")
        );
        assert_eq!(
            merged.extra.get("bankSlipUrl"),
            Some(&json!("https://example.test/slip"))
        );
    }

    #[test]
    fn manual_extras_are_dropped_once_status_leaves_cash() {
        let mut stored = stored_payment();
        stored.status = Some(PaymentStatus::ReceivedInCash);
        stored.manual_payment_extras = Some(ManualPaymentExtras {
            responsible: None,
            date: Utc::now(),
            negotiation: None,
            payment_type: Some("cash".to_string()),
        });

        let still_cash = merge_payment_record(
            PaymentRecord {
                id: Some("pay_1".to_string()),
                ..Default::default()
            },
            stored.clone(),
        );
        assert!(still_cash.manual_payment_extras.is_some());

        let refunded = merge_payment_record(
            PaymentRecord {
                id: Some("pay_1".to_string()),
                status: Some(PaymentStatus::Refunded),
                ..Default::default()
            },
            stored,
        );
        assert!(refunded.manual_payment_extras.is_none());
    }

    #[test]
    fn unknown_gateway_fields_round_trip() {
        let value = json!({ "id": "pay_2", "status": "RECEIVED", "nossoNumero": "123" });
        let record: PaymentRecord = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), value);
    }
}
