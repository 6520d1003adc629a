pub mod asaas_client;
pub mod asaas_gateway;
