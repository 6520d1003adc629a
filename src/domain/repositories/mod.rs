pub mod record_store;
pub mod webhook_ledger;
