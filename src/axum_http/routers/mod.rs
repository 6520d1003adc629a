pub mod asaas;
