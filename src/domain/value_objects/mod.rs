pub mod asaas_webhooks;
pub mod credit_cards;
pub mod customers;
pub mod enums;
pub mod external_reference;
pub mod payments;
pub mod subscriptions;
