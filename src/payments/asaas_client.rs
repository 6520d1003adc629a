use std::fmt::Display;

use axum::http::StatusCode;
use reqwest::{
    Method, RequestBuilder,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error};

use crate::domain::value_objects::{
    credit_cards::TokenizeCreditCardModel,
    customers::{CustomerModel, SubAccountModel},
    payments::{PaymentPage, PaymentRecord, ReceiveInCashModel},
    subscriptions::{PaymentBookQuery, SubscriptionCcRequest, SubscriptionRecord},
};

const ACCESS_TOKEN_HEADER: &str = "access_token";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing params: {0}")]
    MissingParams(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("asaas rejected {context} (status {status})")]
    Rejected {
        context: String,
        status: u16,
        body: Value,
    },
    #[error("asaas request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("asaas response could not be decoded: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingParams(_) => StatusCode::BAD_REQUEST,
            GatewayError::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Rejected { status, .. } => match StatusCode::from_u16(*status) {
                Ok(code) if code.is_client_error() => code,
                _ => StatusCode::BAD_GATEWAY,
            },
            GatewayError::Transport(_) | GatewayError::Decode(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Error payload handed back to command callers. Gateway rejections pass
    /// the gateway's own body through untouched.
    pub fn data(&self) -> Value {
        match self {
            GatewayError::Rejected { body, .. } => body.clone(),
            other => json!({
                "status": other.status_code().as_u16(),
                "message": other.to_string(),
            }),
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsaasEnvironment {
    Sandbox,
    Production,
}

#[derive(Debug, Clone)]
pub struct AsaasClientConfig {
    pub environment: AsaasEnvironment,
    pub api_version: String,
    pub access_token: String,
}

impl AsaasClientConfig {
    pub fn base_url(&self) -> String {
        match self.environment {
            AsaasEnvironment::Production => {
                format!("https://api.asaas.com/{}/", self.api_version)
            }
            AsaasEnvironment::Sandbox => {
                format!("https://sandbox.asaas.com/api/{}/", self.api_version)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct AsaasErrorEnvelope {
    #[serde(default)]
    errors: Vec<AsaasErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorDetails {
    code: Option<String>,
    description: Option<String>,
}

/// Asaas REST client built on reqwest. One instance carries one credential;
/// build a new one per request when the credential is request-scoped.
#[derive(Clone)]
pub struct AsaasClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl AsaasClient {
    pub fn new(config: AsaasClientConfig) -> Self {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    /// Reuses an existing connection pool.
    pub fn with_http_client(http: reqwest::Client, config: AsaasClientConfig) -> Self {
        Self {
            http,
            base_url: config.base_url(),
            access_token: config.access_token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> GatewayResult<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (asaas_error_codes, asaas_error_descriptions): (Vec<String>, Vec<String>) =
            match serde_json::from_str::<AsaasErrorEnvelope>(&body) {
                Ok(envelope) => envelope
                    .errors
                    .into_iter()
                    .map(|details| {
                        (
                            details.code.unwrap_or_default(),
                            details.description.unwrap_or_default(),
                        )
                    })
                    .unzip(),
                Err(_) => (Vec::new(), Vec::new()),
            };

        error!(
            status = %status,
            asaas_error_codes = ?asaas_error_codes,
            asaas_error_descriptions = ?asaas_error_descriptions,
            response_body = %body,
            context = %context,
            "asaas api request failed"
        );

        Err(GatewayError::Rejected {
            context: context.to_string(),
            status: status.as_u16(),
            body: serde_json::from_str(&body).unwrap_or(Value::String(body)),
        })
    }

    /// Sends the request and returns the JSON body. `204 No Content` and empty
    /// bodies come back as `Value::Null`.
    async fn send(&self, builder: RequestBuilder, context: &str) -> GatewayResult<Value> {
        let resp = builder.send().await?;
        let resp = Self::ensure_success(resp, context).await?;
        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|err| GatewayError::Decode(format!("{context}: {err}")))
    }

    async fn send_typed<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> GatewayResult<T> {
        let value = self.send(builder, context).await?;
        serde_json::from_value(value)
            .map_err(|err| GatewayError::Decode(format!("{context}: {err}")))
    }

    pub async fn create_customer(&self, customer: &CustomerModel) -> GatewayResult<Value> {
        // https://docs.asaas.com/reference/criar-novo-cliente
        require_all(
            [&customer.name, &customer.cpf_cnpj],
            "name and cpfCnpj are required to create a customer",
        )?;

        let builder = self.request(Method::POST, "customers").json(customer);
        self.send(builder, "create customer").await
    }

    pub async fn delete_customer(&self, customer_id: &str) -> GatewayResult<Value> {
        require_all([customer_id], "customer id is required")?;

        let builder = self.request(Method::DELETE, &format!("customers/{customer_id}"));
        self.send(builder, "delete customer").await
    }

    pub async fn create_sub_account(&self, sub_account: &SubAccountModel) -> GatewayResult<Value> {
        // https://docs.asaas.com/reference/criar-subconta
        require_all(
            [
                &sub_account.name,
                &sub_account.email,
                &sub_account.cpf_cnpj,
                &sub_account.mobile_phone,
                &sub_account.address,
                &sub_account.address_number,
                &sub_account.province,
                &sub_account.postal_code,
            ],
            "name, email, cpfCnpj, mobilePhone, address, addressNumber, province and postalCode are required to create a sub-account",
        )?;

        let builder = self.request(Method::POST, "accounts").json(sub_account);
        self.send(builder, "create sub-account").await
    }

    pub async fn tokenize_credit_card(
        &self,
        tokenize: &TokenizeCreditCardModel,
    ) -> GatewayResult<Value> {
        // https://docs.asaas.com/reference/tokenizacao-de-cartao-de-credito
        require_all(
            [&tokenize.customer, &tokenize.remote_ip],
            "customer and remoteIp are required to tokenize a card",
        )?;
        if !tokenize.credit_card.is_complete() || !tokenize.credit_card_holder_info.is_complete()
        {
            return Err(GatewayError::BadRequest(
                "complete card and holder data are required to tokenize a card".to_string(),
            ));
        }

        let builder = self.request(Method::POST, "creditCard/tokenize").json(tokenize);
        self.send(builder, "tokenize credit card").await
    }

    pub async fn generate_subscription(
        &self,
        subscription: &SubscriptionRecord,
    ) -> GatewayResult<SubscriptionRecord> {
        validate_subscription_terms(subscription)?;

        let builder = self.request(Method::POST, "subscriptions").json(subscription);
        self.send_typed(builder, "create subscription").await
    }

    pub async fn generate_subscription_cc(
        &self,
        request: &SubscriptionCcRequest,
    ) -> GatewayResult<SubscriptionRecord> {
        validate_subscription_terms(&request.subscription)?;
        require_all(
            [request.remote_ip.as_str()],
            "remoteIp is required to create a card subscription",
        )?;
        let has_card = request.credit_card.is_some() || request.credit_card_token.is_some();
        if !has_card || request.credit_card_holder_info.is_none() {
            return Err(GatewayError::MissingParams(
                "card (or card token) and holder data are required to create a card subscription"
                    .to_string(),
            ));
        }

        let builder = self.request(Method::POST, "subscriptions").json(request);
        self.send_typed(builder, "create card subscription").await
    }

    pub async fn update_subscription(
        &self,
        subscription_id: &str,
        subscription: &SubscriptionRecord,
    ) -> GatewayResult<SubscriptionRecord> {
        require_all([subscription_id], "subscription id is required")?;

        let builder = self
            .request(Method::PUT, &format!("subscriptions/{subscription_id}"))
            .json(subscription);
        self.send_typed(builder, "update subscription").await
    }

    pub async fn delete_subscription(&self, subscription_id: &str) -> GatewayResult<Value> {
        require_all([subscription_id], "subscription id is required")?;

        let builder = self.request(Method::DELETE, &format!("subscriptions/{subscription_id}"));
        self.send(builder, "delete subscription").await
    }

    pub async fn get_subscription_payments(
        &self,
        subscription_id: &str,
        offset: u32,
        limit: u32,
    ) -> GatewayResult<PaymentPage> {
        require_all([subscription_id], "subscription id is required")?;

        let builder = self
            .request(
                Method::GET,
                &format!("subscriptions/{subscription_id}/payments"),
            )
            .query(&[("offset", offset), ("limit", limit)]);
        let page: PaymentPage = self
            .send_typed(builder, "list subscription payments")
            .await?;
        debug!(
            %subscription_id,
            offset,
            fetched = page.data.len(),
            has_more = page.has_more,
            "asaas: subscription payments page fetched"
        );
        Ok(page)
    }

    /// Returns the raw PDF bytes of the subscription's payment book.
    pub async fn get_subscription_paymentbook(
        &self,
        subscription_id: &str,
        query: PaymentBookQuery,
    ) -> GatewayResult<Vec<u8>> {
        require_all([subscription_id], "subscription id is required")?;
        if !(1..=12).contains(&query.month) || query.year <= 0 {
            return Err(GatewayError::MissingParams(
                "month and year are required to build the payment book".to_string(),
            ));
        }

        let resp = self
            .request(
                Method::GET,
                &format!("subscriptions/{subscription_id}/paymentBook"),
            )
            .query(&[
                ("month", query.month.to_string()),
                ("year", query.year.to_string()),
            ])
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "subscription payment book").await?;
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn create_payment(&self, payment: &PaymentRecord) -> GatewayResult<PaymentRecord> {
        // https://docs.asaas.com/reference/criar-nova-cobranca
        let customer = payment.customer.as_deref().unwrap_or_default();
        let due_date = payment.due_date.as_deref().unwrap_or_default();
        require_all(
            [customer, due_date],
            "customer, billingType, value and dueDate are required to create a payment",
        )?;
        if payment.billing_type.is_none() || !positive(payment.value) {
            return Err(GatewayError::MissingParams(
                "customer, billingType, value and dueDate are required to create a payment"
                    .to_string(),
            ));
        }

        let builder = self.request(Method::POST, "payments").json(payment);
        self.send_typed(builder, "create payment").await
    }

    pub async fn update_payment(
        &self,
        payment_id: &str,
        payment: &PaymentRecord,
    ) -> GatewayResult<PaymentRecord> {
        require_all([payment_id], "payment id is required")?;

        let builder = self
            .request(Method::PUT, &format!("payments/{payment_id}"))
            .json(payment);
        self.send_typed(builder, "update payment").await
    }

    pub async fn receive_cash_payment(
        &self,
        payment_id: &str,
        receipt: &ReceiveInCashModel,
    ) -> GatewayResult<PaymentRecord> {
        require_all([payment_id], "payment id is required")?;
        if !positive(Some(receipt.value)) {
            return Err(GatewayError::MissingParams(
                "value is required to receive a payment in cash".to_string(),
            ));
        }

        let builder = self
            .request(Method::POST, &format!("payments/{payment_id}/receiveInCash"))
            .json(receipt);
        self.send_typed(builder, "receive payment in cash").await
    }
}

fn require_all<I, S>(fields: I, message: impl Display) -> GatewayResult<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if fields
        .into_iter()
        .any(|field| field.as_ref().trim().is_empty())
    {
        return Err(GatewayError::MissingParams(message.to_string()));
    }
    Ok(())
}

fn positive(value: Option<f64>) -> bool {
    value.is_some_and(|value| value > 0.0)
}

fn validate_subscription_terms(subscription: &SubscriptionRecord) -> GatewayResult<()> {
    let customer = subscription.customer.as_deref().unwrap_or_default();
    let next_due_date = subscription.next_due_date.as_deref().unwrap_or_default();
    require_all(
        [customer, next_due_date],
        "customer, billingType, value and nextDueDate are required to create a subscription",
    )?;
    if subscription.billing_type.is_none() || !positive(subscription.value) {
        return Err(GatewayError::MissingParams(
            "customer, billingType, value and nextDueDate are required to create a subscription"
                .to_string(),
        ));
    }
    Ok(())
}
