use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BillingType {
    Undefined,
    Boleto,
    CreditCard,
    Pix,
    /// Billing types the gateway reports on charges but that commands never issue.
    Other(String),
}

impl BillingType {
    pub fn as_str(&self) -> &str {
        match self {
            BillingType::Undefined => "UNDEFINED",
            BillingType::Boleto => "BOLETO",
            BillingType::CreditCard => "CREDIT_CARD",
            BillingType::Pix => "PIX",
            BillingType::Other(raw) => raw.as_str(),
        }
    }

    /// Strict parse used when validating commands: only the four issuable types.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UNDEFINED" => Some(BillingType::Undefined),
            "BOLETO" => Some(BillingType::Boleto),
            "CREDIT_CARD" => Some(BillingType::CreditCard),
            "PIX" => Some(BillingType::Pix),
            _ => None,
        }
    }
}

impl Display for BillingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for BillingType {
    fn from(value: String) -> Self {
        BillingType::parse(&value).unwrap_or(BillingType::Other(value))
    }
}

impl From<BillingType> for String {
    fn from(value: BillingType) -> Self {
        value.as_str().to_string()
    }
}
