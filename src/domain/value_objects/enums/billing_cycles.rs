use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingCycle {
    Weekly,
    Biweekly,
    Monthly,
    Bimonthly,
    Quarterly,
    Semiannually,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Weekly => "WEEKLY",
            BillingCycle::Biweekly => "BIWEEKLY",
            BillingCycle::Monthly => "MONTHLY",
            BillingCycle::Bimonthly => "BIMONTHLY",
            BillingCycle::Quarterly => "QUARTERLY",
            BillingCycle::Semiannually => "SEMIANNUALLY",
            BillingCycle::Yearly => "YEARLY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "WEEKLY" => Some(BillingCycle::Weekly),
            "BIWEEKLY" => Some(BillingCycle::Biweekly),
            "MONTHLY" => Some(BillingCycle::Monthly),
            "BIMONTHLY" => Some(BillingCycle::Bimonthly),
            "QUARTERLY" => Some(BillingCycle::Quarterly),
            "SEMIANNUALLY" => Some(BillingCycle::Semiannually),
            "YEARLY" => Some(BillingCycle::Yearly),
            _ => None,
        }
    }
}

impl Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
