use async_trait::async_trait;
use serde_json::Value;

use crate::{
    domain::value_objects::{
        credit_cards::TokenizeCreditCardModel,
        customers::{CustomerModel, SubAccountModel},
        payments::{PaymentPage, PaymentRecord, ReceiveInCashModel},
        subscriptions::{PaymentBookQuery, SubscriptionCcRequest, SubscriptionRecord},
    },
    payments::asaas_client::{AsaasClient, GatewayResult},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AsaasGateway: Send + Sync {
    async fn create_customer(&self, customer: &CustomerModel) -> GatewayResult<Value>;

    async fn delete_customer(&self, customer_id: &str) -> GatewayResult<Value>;

    async fn create_sub_account(&self, sub_account: &SubAccountModel) -> GatewayResult<Value>;

    async fn tokenize_credit_card(
        &self,
        tokenize: &TokenizeCreditCardModel,
    ) -> GatewayResult<Value>;

    async fn generate_subscription(
        &self,
        subscription: &SubscriptionRecord,
    ) -> GatewayResult<SubscriptionRecord>;

    async fn generate_subscription_cc(
        &self,
        request: &SubscriptionCcRequest,
    ) -> GatewayResult<SubscriptionRecord>;

    async fn update_subscription(
        &self,
        subscription_id: &str,
        subscription: &SubscriptionRecord,
    ) -> GatewayResult<SubscriptionRecord>;

    async fn delete_subscription(&self, subscription_id: &str) -> GatewayResult<Value>;

    async fn get_subscription_payments(
        &self,
        subscription_id: &str,
        offset: u32,
        limit: u32,
    ) -> GatewayResult<PaymentPage>;

    async fn get_subscription_paymentbook(
        &self,
        subscription_id: &str,
        query: PaymentBookQuery,
    ) -> GatewayResult<Vec<u8>>;

    async fn create_payment(&self, payment: &PaymentRecord) -> GatewayResult<PaymentRecord>;

    async fn update_payment(
        &self,
        payment_id: &str,
        payment: &PaymentRecord,
    ) -> GatewayResult<PaymentRecord>;

    async fn receive_cash_payment(
        &self,
        payment_id: &str,
        receipt: &ReceiveInCashModel,
    ) -> GatewayResult<PaymentRecord>;
}

#[async_trait]
impl AsaasGateway for AsaasClient {
    async fn create_customer(&self, customer: &CustomerModel) -> GatewayResult<Value> {
        self.create_customer(customer).await
    }

    async fn delete_customer(&self, customer_id: &str) -> GatewayResult<Value> {
        self.delete_customer(customer_id).await
    }

    async fn create_sub_account(&self, sub_account: &SubAccountModel) -> GatewayResult<Value> {
        self.create_sub_account(sub_account).await
    }

    async fn tokenize_credit_card(
        &self,
        tokenize: &TokenizeCreditCardModel,
    ) -> GatewayResult<Value> {
        self.tokenize_credit_card(tokenize).await
    }

    async fn generate_subscription(
        &self,
        subscription: &SubscriptionRecord,
    ) -> GatewayResult<SubscriptionRecord> {
        self.generate_subscription(subscription).await
    }

    async fn generate_subscription_cc(
        &self,
        request: &SubscriptionCcRequest,
    ) -> GatewayResult<SubscriptionRecord> {
        self.generate_subscription_cc(request).await
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        subscription: &SubscriptionRecord,
    ) -> GatewayResult<SubscriptionRecord> {
        self.update_subscription(subscription_id, subscription).await
    }

    async fn delete_subscription(&self, subscription_id: &str) -> GatewayResult<Value> {
        self.delete_subscription(subscription_id).await
    }

    async fn get_subscription_payments(
        &self,
        subscription_id: &str,
        offset: u32,
        limit: u32,
    ) -> GatewayResult<PaymentPage> {
        self.get_subscription_payments(subscription_id, offset, limit)
            .await
    }

    async fn get_subscription_paymentbook(
        &self,
        subscription_id: &str,
        query: PaymentBookQuery,
    ) -> GatewayResult<Vec<u8>> {
        self.get_subscription_paymentbook(subscription_id, query)
            .await
    }

    async fn create_payment(&self, payment: &PaymentRecord) -> GatewayResult<PaymentRecord> {
        self.create_payment(payment).await
    }

    async fn update_payment(
        &self,
        payment_id: &str,
        payment: &PaymentRecord,
    ) -> GatewayResult<PaymentRecord> {
        self.update_payment(payment_id, payment).await
    }

    async fn receive_cash_payment(
        &self,
        payment_id: &str,
        receipt: &ReceiveInCashModel,
    ) -> GatewayResult<PaymentRecord> {
        self.receive_cash_payment(payment_id, receipt).await
    }
}
