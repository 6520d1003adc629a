pub mod billing_cycles;
pub mod billing_types;
pub mod owner_statuses;
pub mod payment_statuses;
pub mod subscription_statuses;
pub mod webhook_events;
