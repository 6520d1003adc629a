pub mod billing_commands;
pub mod owner_locks;
pub mod reconciliation;
pub mod webhook_ingestion;
