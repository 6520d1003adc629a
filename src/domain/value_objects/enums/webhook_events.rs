use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// How a payment payload is folded into its owner's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    Create,
    Update,
    Delete,
}

impl Display for UpdateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self {
            UpdateMode::Create => "create",
            UpdateMode::Update => "update",
            UpdateMode::Delete => "delete",
        };
        write!(f, "{}", mode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WebhookEventType {
    PaymentCreated,
    PaymentDeleted,
    /// Every status-transition event (`PAYMENT_RECEIVED`, `PAYMENT_OVERDUE`, ...).
    Other(String),
}

impl WebhookEventType {
    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventType::PaymentCreated => "PAYMENT_CREATED",
            WebhookEventType::PaymentDeleted => "PAYMENT_DELETED",
            WebhookEventType::Other(raw) => raw.as_str(),
        }
    }

    pub fn update_mode(&self) -> UpdateMode {
        match self {
            WebhookEventType::PaymentDeleted => UpdateMode::Delete,
            WebhookEventType::PaymentCreated => UpdateMode::Create,
            WebhookEventType::Other(_) => UpdateMode::Update,
        }
    }
}

impl Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for WebhookEventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PAYMENT_CREATED" => WebhookEventType::PaymentCreated,
            "PAYMENT_DELETED" => WebhookEventType::PaymentDeleted,
            _ => WebhookEventType::Other(value),
        }
    }
}

impl From<WebhookEventType> for String {
    fn from(value: WebhookEventType) -> Self {
        value.as_str().to_string()
    }
}
