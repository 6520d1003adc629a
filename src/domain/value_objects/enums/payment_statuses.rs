use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Charge states reported by the gateway. Unknown states are kept verbatim so a
/// newer gateway status never fails deserialization of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    Pending,
    Received,
    Confirmed,
    Overdue,
    Refunded,
    ReceivedInCash,
    RefundRequested,
    RefundInProgress,
    ChargebackRequested,
    ChargebackDispute,
    AwaitingChargebackReversal,
    DunningRequested,
    DunningReceived,
    AwaitingRiskAnalysis,
    Other(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Received => "RECEIVED",
            PaymentStatus::Confirmed => "CONFIRMED",
            PaymentStatus::Overdue => "OVERDUE",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::ReceivedInCash => "RECEIVED_IN_CASH",
            PaymentStatus::RefundRequested => "REFUND_REQUESTED",
            PaymentStatus::RefundInProgress => "REFUND_IN_PROGRESS",
            PaymentStatus::ChargebackRequested => "CHARGEBACK_REQUESTED",
            PaymentStatus::ChargebackDispute => "CHARGEBACK_DISPUTE",
            PaymentStatus::AwaitingChargebackReversal => "AWAITING_CHARGEBACK_REVERSAL",
            PaymentStatus::DunningRequested => "DUNNING_REQUESTED",
            PaymentStatus::DunningReceived => "DUNNING_RECEIVED",
            PaymentStatus::AwaitingRiskAnalysis => "AWAITING_RISK_ANALYSIS",
            PaymentStatus::Other(raw) => raw.as_str(),
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => PaymentStatus::Pending,
            "RECEIVED" => PaymentStatus::Received,
            "CONFIRMED" => PaymentStatus::Confirmed,
            "OVERDUE" => PaymentStatus::Overdue,
            "REFUNDED" => PaymentStatus::Refunded,
            "RECEIVED_IN_CASH" => PaymentStatus::ReceivedInCash,
            "REFUND_REQUESTED" => PaymentStatus::RefundRequested,
            "REFUND_IN_PROGRESS" => PaymentStatus::RefundInProgress,
            "CHARGEBACK_REQUESTED" => PaymentStatus::ChargebackRequested,
            "CHARGEBACK_DISPUTE" => PaymentStatus::ChargebackDispute,
            "AWAITING_CHARGEBACK_REVERSAL" => PaymentStatus::AwaitingChargebackReversal,
            "DUNNING_REQUESTED" => PaymentStatus::DunningRequested,
            "DUNNING_RECEIVED" => PaymentStatus::DunningReceived,
            "AWAITING_RISK_ANALYSIS" => PaymentStatus::AwaitingRiskAnalysis,
            _ => PaymentStatus::Other(value.to_string()),
        }
    }

    /// Payments auto-generated by a subscription still awaiting settlement.
    /// These are the only ones re-stamped with the owner's back-reference.
    pub fn awaits_settlement(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Overdue)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        PaymentStatus::from_str(&value)
    }
}

impl From<PaymentStatus> for String {
    fn from(value: PaymentStatus) -> Self {
        value.as_str().to_string()
    }
}
