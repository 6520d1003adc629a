use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Expired,
    Other(String),
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Inactive => "INACTIVE",
            SubscriptionStatus::Expired => "EXPIRED",
            SubscriptionStatus::Other(raw) => raw.as_str(),
        };
        write!(f, "{}", status)
    }
}

impl From<String> for SubscriptionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ACTIVE" => SubscriptionStatus::Active,
            "INACTIVE" => SubscriptionStatus::Inactive,
            "EXPIRED" => SubscriptionStatus::Expired,
            _ => SubscriptionStatus::Other(value),
        }
    }
}

impl From<SubscriptionStatus> for String {
    fn from(value: SubscriptionStatus) -> Self {
        value.to_string()
    }
}
