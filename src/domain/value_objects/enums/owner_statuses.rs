use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Rollup status written on an owner document after each list mutation.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OwnerStatus {
    #[default]
    Active,
    Overdue,
    Canceled,
}

impl Display for OwnerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            OwnerStatus::Active => "active",
            OwnerStatus::Overdue => "overdue",
            OwnerStatus::Canceled => "canceled",
        };
        write!(f, "{}", status)
    }
}

impl OwnerStatus {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "active" => Some(OwnerStatus::Active),
            "overdue" => Some(OwnerStatus::Overdue),
            "canceled" => Some(OwnerStatus::Canceled),
            _ => None,
        }
    }
}
