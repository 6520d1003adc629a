pub mod asaas_webhooks;
pub mod documents;
