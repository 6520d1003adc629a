use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info};

use crate::{
    domain::{
        repositories::record_store::RecordStore,
        value_objects::{
            credit_cards::{CreditCard, CreditCardHolderInfo, TokenizeCreditCardModel},
            customers::{CustomerModel, SubAccountModel},
            enums::{
                billing_cycles::BillingCycle, billing_types::BillingType,
                webhook_events::UpdateMode,
            },
            external_reference::{OwnerPath, PAYMENTS_FIELD},
            payments::{
                ManualPaymentExtras, PaymentRecord, ReceiveInCashModel, Responsible,
                merge_payment_record,
            },
            subscriptions::{PaymentBookQuery, SubscriptionCcRequest, SubscriptionRecord},
        },
    },
    payments::{asaas_client::GatewayError, asaas_gateway::AsaasGateway},
    usecases::reconciliation::{ReconcileError, ReconciliationEngine, SubscriptionBinding},
};

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("{0}")]
    MissingParams(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("owner document not found: {0}")]
    OwnerNotFound(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl BillingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::MissingParams(_) => StatusCode::BAD_REQUEST,
            BillingError::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BillingError::OwnerNotFound(_) => StatusCode::NOT_FOUND,
            BillingError::Gateway(err) => err.status_code(),
            BillingError::Reconcile(err) => err.status_code(),
        }
    }

    /// Payload for the `{success: false, data}` envelope. Gateway rejections
    /// pass the gateway's own body through.
    pub fn data(&self) -> Value {
        match self {
            BillingError::Gateway(err)
            | BillingError::Reconcile(ReconcileError::GatewayCallFailed(err)) => err.data(),
            other => json!({
                "status": other.status_code().as_u16(),
                "message": other.to_string(),
            }),
        }
    }
}

pub type BillingResult<T> = std::result::Result<T, BillingError>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCustomerCommand {
    pub name: Option<String>,
    #[serde(alias = "cpfCnpj")]
    pub cpf_cnpj: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub external_reference: Option<String>,
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSubAccountCommand {
    pub name: Option<String>,
    #[serde(alias = "cpfCnpj")]
    pub cpf_cnpj: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub address: Option<String>,
    pub address_number: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub income_value: Option<f64>,
    pub company_type: Option<String>,
    pub external_reference: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditCardInput {
    pub token: Option<String>,
    pub holder_name: Option<String>,
    pub number: Option<String>,
    pub expiry_month: Option<String>,
    pub expiry_year: Option<String>,
    pub ccv: Option<String>,
}

impl CreditCardInput {
    fn to_card(&self) -> CreditCard {
        CreditCard {
            holder_name: self.holder_name.clone().unwrap_or_default(),
            number: self.number.clone().unwrap_or_default(),
            expiry_month: self.expiry_month.clone().unwrap_or_default(),
            expiry_year: self.expiry_year.clone().unwrap_or_default(),
            ccv: self.ccv.clone().unwrap_or_default(),
        }
    }

    fn token(&self) -> Option<String> {
        self.token.clone().filter(|token| !token.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardHolderInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub cpf_cnpj: Option<String>,
    pub postal_code: Option<String>,
    pub address_number: Option<String>,
    pub address_complement: Option<String>,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
}

impl CardHolderInput {
    fn to_holder(&self) -> CreditCardHolderInfo {
        CreditCardHolderInfo {
            name: self.name.clone().unwrap_or_default(),
            email: self.email.clone().unwrap_or_default(),
            cpf_cnpj: self.cpf_cnpj.clone().unwrap_or_default(),
            postal_code: self.postal_code.clone().unwrap_or_default(),
            address_number: self.address_number.clone().unwrap_or_default(),
            address_complement: self.address_complement.clone(),
            phone: self.phone.clone().unwrap_or_default(),
            mobile_phone: self.mobile_phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenizeCardCommand {
    pub customer_id: Option<String>,
    pub ip: Option<String>,
    pub credit_card: Option<CreditCardInput>,
    pub credit_card_holder_info: Option<CardHolderInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionTermsInput {
    pub value: Option<f64>,
    pub next_due_date: Option<String>,
    pub cycle: Option<String>,
    pub billing_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSubscriptionCommand {
    pub customer_id: Option<String>,
    pub reference_path: Option<String>,
    pub subscription: Option<SubscriptionTermsInput>,
    pub ip: Option<String>,
    pub credit_card: Option<CreditCardInput>,
    pub credit_card_holder_info: Option<CardHolderInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePaymentCommand {
    pub reference_path: Option<String>,
    pub customer_id: Option<String>,
    pub billing_type: Option<String>,
    pub value: Option<f64>,
    pub due_date: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceiveInCashCommand {
    pub payment_id: Option<String>,
    pub value: Option<f64>,
    pub payment_date: Option<String>,
    #[serde(alias = "payment_negociation")]
    pub payment_negotiation: Option<String>,
    pub payment_type: Option<String>,
    #[serde(default)]
    pub notify_customer: bool,
    pub responsible: Option<Responsible>,
}

/// Request-level billing operations. Each call receives the gateway built for
/// the caller's credential.
pub struct BillingCommands<S>
where
    S: RecordStore + ?Sized,
{
    engine: ReconciliationEngine<S>,
}

impl<S> BillingCommands<S>
where
    S: RecordStore + ?Sized + 'static,
{
    pub fn new(engine: ReconciliationEngine<S>) -> Self {
        Self { engine }
    }

    pub async fn create_customer<G>(
        &self,
        gateway: &G,
        command: CreateCustomerCommand,
    ) -> BillingResult<Value>
    where
        G: AsaasGateway + ?Sized,
    {
        let (Some(name), Some(cpf_cnpj), Some(external_reference)) = (
            present(command.name),
            present(command.cpf_cnpj),
            present(command.external_reference),
        ) else {
            return Err(BillingError::MissingParams(
                "name, cpfCnpj and external_reference are required".to_string(),
            ));
        };

        let phone = present(command.phone);
        let customer = CustomerModel {
            name,
            cpf_cnpj,
            email: present(command.email),
            mobile_phone: phone.clone(),
            phone,
            external_reference: Some(external_reference),
            group_name: present(command.group_name),
        };

        let created = gateway.create_customer(&customer).await?;
        info!(customer_id = ?created.get("id"), "billing: customer created");
        Ok(created)
    }

    pub async fn delete_customer<G>(&self, gateway: &G, customer_id: &str) -> BillingResult<Value>
    where
        G: AsaasGateway + ?Sized,
    {
        if customer_id.trim().is_empty() {
            return Err(BillingError::MissingParams("customer id is required".to_string()));
        }
        let deleted = gateway.delete_customer(customer_id).await?;
        info!(%customer_id, "billing: customer deleted");
        Ok(deleted)
    }

    pub async fn create_sub_account<G>(
        &self,
        gateway: &G,
        command: CreateSubAccountCommand,
    ) -> BillingResult<Value>
    where
        G: AsaasGateway + ?Sized,
    {
        let (
            Some(name),
            Some(cpf_cnpj),
            Some(email),
            Some(external_reference),
            Some(birth_date),
            Some(address),
            Some(address_number),
            Some(province),
            Some(postal_code),
            Some(income_value),
        ) = (
            present(command.name),
            present(command.cpf_cnpj),
            present(command.email),
            present(command.external_reference),
            present(command.birth_date),
            present(command.address),
            present(command.address_number),
            present(command.province),
            present(command.postal_code),
            command.income_value.filter(|value| *value > 0.0),
        )
        else {
            return Err(BillingError::MissingParams(
                "name, cpfCnpj, email, external_reference, birth_date, address, address_number, province, postal_code and income_value are required"
                    .to_string(),
            ));
        };

        let phone = present(command.phone);
        let sub_account = SubAccountModel {
            name,
            email,
            cpf_cnpj,
            birth_date,
            mobile_phone: phone.clone().unwrap_or_default(),
            address,
            address_number,
            province,
            postal_code,
            income_value,
            phone,
            company_type: present(command.company_type),
            external_reference: Some(external_reference),
        };

        let created = gateway.create_sub_account(&sub_account).await?;
        info!(account_id = ?created.get("id"), "billing: sub-account created");
        Ok(created)
    }

    pub async fn tokenize_credit_card<G>(
        &self,
        gateway: &G,
        command: TokenizeCardCommand,
    ) -> BillingResult<Value>
    where
        G: AsaasGateway + ?Sized,
    {
        let (Some(customer), Some(remote_ip), Some(card), Some(holder)) = (
            present(command.customer_id),
            present(command.ip),
            command.credit_card,
            command.credit_card_holder_info,
        ) else {
            return Err(BillingError::MissingParams(
                "customer_id, credit_card, credit_card_holder_info and ip are required".to_string(),
            ));
        };

        let tokenize = TokenizeCreditCardModel {
            customer,
            credit_card: card.to_card(),
            credit_card_holder_info: holder.to_holder(),
            remote_ip,
        };
        Ok(gateway.tokenize_credit_card(&tokenize).await?)
    }

    /// Creates the subscription at the gateway and binds it to the owner at
    /// `reference_path`. Card data (or a card token) with the payer's ip and
    /// holder info charges the card directly; anything else yields a
    /// payment-link subscription.
    pub async fn create_subscription<G>(
        &self,
        gateway: Arc<G>,
        command: CreateSubscriptionCommand,
    ) -> BillingResult<SubscriptionBinding>
    where
        G: AsaasGateway + ?Sized + 'static,
    {
        let (Some(customer_id), Some(reference_path)) =
            (present(command.customer_id), present(command.reference_path))
        else {
            return Err(BillingError::MissingParams(
                "customer_id and reference_path are required".to_string(),
            ));
        };
        let owner = self.existing_owner(&reference_path).await?;

        let terms = command.subscription.ok_or_else(|| {
            BillingError::MissingParams("subscription is required".to_string())
        })?;
        let (Some(value), Some(next_due_date), Some(cycle), Some(billing_type)) = (
            terms.value.filter(|value| *value > 0.0),
            present(terms.next_due_date),
            present(terms.cycle),
            present(terms.billing_type),
        ) else {
            return Err(BillingError::BadRequest(
                "subscription requires value, next_due_date, cycle and billing_type".to_string(),
            ));
        };
        let billing_type = BillingType::parse(&billing_type).ok_or_else(|| {
            BillingError::BadRequest(format!("unsupported billing_type `{billing_type}`"))
        })?;
        let cycle = BillingCycle::parse(&cycle)
            .ok_or_else(|| BillingError::BadRequest(format!("unsupported cycle `{cycle}`")))?;
        let next_due_date = normalize_date(&next_due_date).ok_or_else(|| {
            BillingError::BadRequest(format!("invalid next_due_date `{next_due_date}`"))
        })?;

        let subscription = SubscriptionRecord {
            customer: Some(customer_id.clone()),
            billing_type: Some(billing_type.clone()),
            cycle: Some(cycle),
            value: Some(value),
            next_due_date: Some(next_due_date),
            description: present(terms.description),
            // Routes early payment webhooks to the owner until the binding
            // stamps the final reference.
            external_reference: Some(owner.to_string()),
            ..Default::default()
        };

        let card_payment = match (
            billing_type,
            present(command.ip),
            command.credit_card,
            command.credit_card_holder_info,
        ) {
            (BillingType::CreditCard, Some(ip), Some(card), Some(holder)) => {
                Some((ip, card, holder))
            }
            _ => None,
        };

        let created = match card_payment {
            Some((remote_ip, card, holder)) => {
                let token = card.token();
                let credit_card = card.to_card();
                if token.is_none() && !credit_card.is_complete() {
                    return Err(BillingError::BadRequest(
                        "credit_card requires holder_name, number, expiry_month, expiry_year and ccv"
                            .to_string(),
                    ));
                }
                let request = SubscriptionCcRequest {
                    subscription,
                    credit_card: token.is_none().then_some(credit_card),
                    credit_card_holder_info: Some(holder.to_holder()),
                    credit_card_token: token,
                    remote_ip,
                };
                gateway.generate_subscription_cc(&request).await
            }
            None => gateway.generate_subscription(&subscription).await,
        }
        .map_err(|err| {
            error!(
                %owner,
                %customer_id,
                error = ?err,
                "billing: gateway refused subscription"
            );
            BillingError::Gateway(err)
        })?;

        info!(
            %owner,
            %customer_id,
            subscription_id = ?created.id,
            "billing: subscription created at gateway"
        );

        let binding = self
            .engine
            .bind_subscription_reference(gateway, &owner, created)
            .await?;
        Ok(binding)
    }

    /// Deletes the subscription at the gateway, then drops it from the owner
    /// when `reference_path` is given.
    pub async fn delete_subscription<G>(
        &self,
        gateway: &G,
        subscription_id: &str,
        reference_path: Option<&str>,
    ) -> BillingResult<Value>
    where
        G: AsaasGateway + ?Sized,
    {
        if subscription_id.trim().is_empty() {
            return Err(BillingError::MissingParams(
                "subscription id is required".to_string(),
            ));
        }
        let owner = reference_path
            .filter(|path| !path.trim().is_empty())
            .map(parse_owner)
            .transpose()?;

        let deleted = gateway.delete_subscription(subscription_id).await?;

        if let Some(owner) = owner {
            self.engine
                .remove_subscription(&owner, subscription_id)
                .await?;
        }
        info!(%subscription_id, "billing: subscription deleted");
        Ok(deleted)
    }

    pub async fn payment_book<G>(
        &self,
        gateway: &G,
        subscription_id: &str,
        month: Option<u32>,
        year: Option<i32>,
    ) -> BillingResult<Vec<u8>>
    where
        G: AsaasGateway + ?Sized,
    {
        let (Some(month), Some(year)) = (month, year) else {
            return Err(BillingError::MissingParams(
                "month and year are required to build the payment book".to_string(),
            ));
        };
        Ok(gateway
            .get_subscription_paymentbook(subscription_id, PaymentBookQuery { month, year })
            .await?)
    }

    /// Creates a one-off charge and records it on the owner.
    pub async fn create_payment<G>(
        &self,
        gateway: &G,
        command: CreatePaymentCommand,
    ) -> BillingResult<PaymentRecord>
    where
        G: AsaasGateway + ?Sized,
    {
        let (
            Some(reference_path),
            Some(customer),
            Some(billing_type),
            Some(value),
            Some(due_date),
        ) = (
            present(command.reference_path),
            present(command.customer_id),
            present(command.billing_type),
            command.value,
            present(command.due_date),
        ) else {
            return Err(BillingError::MissingParams(
                "reference_path, customer_id, billing_type, value and due_date are required"
                    .to_string(),
            ));
        };
        let billing_type = BillingType::parse(&billing_type).ok_or_else(|| {
            BillingError::BadRequest(format!("unsupported billing_type `{billing_type}`"))
        })?;
        let due_date = normalize_date(&due_date)
            .ok_or_else(|| BillingError::BadRequest(format!("invalid due_date `{due_date}`")))?;
        let owner = self.existing_owner(&reference_path).await?;

        let created = gateway
            .create_payment(&PaymentRecord {
                customer: Some(customer),
                billing_type: Some(billing_type),
                value: Some(value),
                due_date: Some(due_date),
                description: present(command.description),
                external_reference: Some(owner.to_string()),
                ..Default::default()
            })
            .await?;
        let payment_id = created
            .id
            .clone()
            .ok_or(ReconcileError::MissingReference("id"))?;

        let stamped = PaymentRecord {
            external_reference: Some(
                owner
                    .record_reference(PAYMENTS_FIELD, &payment_id)
                    .to_string(),
            ),
            ..created
        };
        let updated = gateway.update_payment(&payment_id, &stamped).await?;
        let payment = merge_payment_record(updated, stamped);

        self.engine
            .apply_payment_update(payment.clone(), UpdateMode::Create)
            .await?;
        info!(%owner, %payment_id, "billing: payment created for owner");
        Ok(payment)
    }

    /// Registers a cash receipt at the gateway and folds the receipt, with who
    /// recorded it, into the owner's copy of the payment.
    pub async fn receive_in_cash<G>(
        &self,
        gateway: &G,
        command: ReceiveInCashCommand,
    ) -> BillingResult<PaymentRecord>
    where
        G: AsaasGateway + ?Sized,
    {
        let (Some(payment_id), Some(value), Some(payment_date)) = (
            present(command.payment_id),
            command.value.filter(|value| *value > 0.0),
            present(command.payment_date),
        ) else {
            return Err(BillingError::MissingParams(
                "payment_id, value and payment_date are required".to_string(),
            ));
        };
        let payment_date = normalize_date(&payment_date).ok_or_else(|| {
            BillingError::BadRequest(format!("invalid payment_date `{payment_date}`"))
        })?;

        let received = gateway
            .receive_cash_payment(
                &payment_id,
                &ReceiveInCashModel {
                    payment_date,
                    value,
                    notify_customer: command.notify_customer,
                },
            )
            .await?;

        let payment = PaymentRecord {
            manual_payment_extras: Some(ManualPaymentExtras {
                responsible: command.responsible,
                date: Utc::now(),
                negotiation: present(command.payment_negotiation),
                payment_type: present(command.payment_type),
            }),
            ..received
        };

        self.engine
            .apply_payment_update(payment.clone(), UpdateMode::Update)
            .await?;
        info!(%payment_id, "billing: cash receipt recorded");
        Ok(payment)
    }

    pub async fn refresh_subscription_payments<G>(
        &self,
        gateway: &G,
        reference_path: &str,
        subscription_id: &str,
    ) -> BillingResult<Vec<Value>>
    where
        G: AsaasGateway + ?Sized,
    {
        let owner = parse_owner(reference_path)?;
        Ok(self
            .engine
            .refresh_subscription_payments(gateway, &owner, subscription_id)
            .await?)
    }

    pub async fn repair_pending_bindings<G>(
        &self,
        gateway: &G,
        reference_path: &str,
    ) -> BillingResult<Vec<String>>
    where
        G: AsaasGateway + ?Sized,
    {
        let owner = parse_owner(reference_path)?;
        Ok(self.engine.repair_pending_bindings(gateway, &owner).await?)
    }

    async fn existing_owner(&self, reference_path: &str) -> BillingResult<OwnerPath> {
        let owner = parse_owner(reference_path)?;
        if self.engine.find_owner(&owner).await?.is_none() {
            return Err(BillingError::OwnerNotFound(owner.to_string()));
        }
        Ok(owner)
    }
}

fn parse_owner(reference_path: &str) -> BillingResult<OwnerPath> {
    OwnerPath::parse(reference_path).map_err(|err| BillingError::BadRequest(err.to_string()))
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp and returns the UTC calendar
/// date as `YYYY-MM-DD`.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc).format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::value_objects::{
            enums::payment_statuses::PaymentStatus, payments::PaymentPage,
        },
        infra::memory::record_store::InMemoryRecordStore,
        payments::asaas_gateway::MockAsaasGateway,
        usecases::{owner_locks::OwnerLocks, reconciliation::ReconcileSettings},
    };
    use serde_json::Map;

    async fn commands_with_owner() -> (
        Arc<InMemoryRecordStore>,
        BillingCommands<InMemoryRecordStore>,
    ) {
        let store = Arc::new(InMemoryRecordStore::new());
        let mut owner = Map::new();
        owner.insert("name".to_string(), json!("Construtora Lima"));
        store.set_merge("clients/c1", owner).await.unwrap();

        let engine = ReconciliationEngine::new(
            Arc::clone(&store),
            Arc::new(OwnerLocks::new()),
            ReconcileSettings::default(),
        );
        (store, BillingCommands::new(engine))
    }

    fn subscription_command(billing_type: &str) -> CreateSubscriptionCommand {
        CreateSubscriptionCommand {
            customer_id: Some("cus_1".to_string()),
            reference_path: Some("clients/c1".to_string()),
            subscription: Some(SubscriptionTermsInput {
                value: Some(250.0),
                next_due_date: Some("2024-07-10T15:00:00Z".to_string()),
                cycle: Some("monthly".to_string()),
                billing_type: Some(billing_type.to_string()),
                description: None,
            }),
            ..Default::default()
        }
    }

    fn created_subscription(request: &SubscriptionRecord) -> SubscriptionRecord {
        SubscriptionRecord {
            id: Some("sub_1".to_string()),
            ..request.clone()
        }
    }

    fn gateway_accepting_binding(gateway: &mut MockAsaasGateway) {
        gateway
            .expect_update_subscription()
            .returning(|_, sub| Ok(sub.clone()));
        gateway
            .expect_get_subscription_payments()
            .returning(|_, _, _| Ok(PaymentPage::default()));
    }

    #[tokio::test]
    async fn boleto_subscription_is_created_and_bound() {
        let (store, commands) = commands_with_owner().await;
        let mut gateway = MockAsaasGateway::new();
        gateway
            .expect_generate_subscription()
            .withf(|sub| {
                sub.next_due_date.as_deref() == Some("2024-07-10")
                    && sub.cycle == Some(BillingCycle::Monthly)
                    && sub.external_reference.as_deref() == Some("clients/c1")
            })
            .times(1)
            .returning(|sub| Ok(created_subscription(sub)));
        gateway.expect_generate_subscription_cc().never();
        gateway_accepting_binding(&mut gateway);

        let binding = commands
            .create_subscription(Arc::new(gateway), subscription_command("boleto"))
            .await
            .unwrap();
        binding.refresh.await.unwrap().unwrap();

        assert_eq!(
            binding.subscription.external_reference.as_deref(),
            Some("clients/c1/subscriptions/sub_1")
        );
        let owner = store.get("clients/c1").await.unwrap().unwrap();
        assert_eq!(owner.list("subscriptions").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn card_subscription_with_token_charges_the_card() {
        let (_, commands) = commands_with_owner().await;
        let mut gateway = MockAsaasGateway::new();
        gateway
            .expect_generate_subscription_cc()
            .withf(|request| {
                request.credit_card_token.as_deref() == Some("tok_1")
                    && request.credit_card.is_none()
                    && request.remote_ip == "10.0.0.1"
            })
            .times(1)
            .returning(|request| Ok(created_subscription(&request.subscription)));
        gateway.expect_generate_subscription().never();
        gateway_accepting_binding(&mut gateway);

        let mut command = subscription_command("CREDIT_CARD");
        command.ip = Some("10.0.0.1".to_string());
        command.credit_card = Some(CreditCardInput {
            token: Some("tok_1".to_string()),
            ..Default::default()
        });
        command.credit_card_holder_info = Some(CardHolderInput::default());

        commands
            .create_subscription(Arc::new(gateway), command)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn card_subscription_without_card_data_becomes_a_payment_link() {
        let (_, commands) = commands_with_owner().await;
        let mut gateway = MockAsaasGateway::new();
        gateway
            .expect_generate_subscription()
            .withf(|sub| sub.billing_type == Some(BillingType::CreditCard))
            .times(1)
            .returning(|sub| Ok(created_subscription(sub)));
        gateway.expect_generate_subscription_cc().never();
        gateway_accepting_binding(&mut gateway);

        commands
            .create_subscription(Arc::new(gateway), subscription_command("CREDIT_CARD"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn incomplete_card_without_token_is_rejected() {
        let (_, commands) = commands_with_owner().await;
        let mut command = subscription_command("CREDIT_CARD");
        command.ip = Some("10.0.0.1".to_string());
        command.credit_card = Some(CreditCardInput {
            number: Some("4444444444444444".to_string()),
            ..Default::default()
        });
        command.credit_card_holder_info = Some(CardHolderInput::default());

        let err = commands
            .create_subscription(Arc::new(MockAsaasGateway::new()), command)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn subscription_command_validation() {
        let (_, commands) = commands_with_owner().await;
        let gateway = Arc::new(MockAsaasGateway::new());

        let mut missing_owner = subscription_command("PIX");
        missing_owner.reference_path = None;
        let err = commands
            .create_subscription(Arc::clone(&gateway), missing_owner)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let mut no_terms = subscription_command("PIX");
        no_terms.subscription = None;
        let err = commands
            .create_subscription(Arc::clone(&gateway), no_terms)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = commands
            .create_subscription(Arc::clone(&gateway), subscription_command("CHEQUE"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let mut unknown_owner = subscription_command("PIX");
        unknown_owner.reference_path = Some("clients/ghost".to_string());
        let err = commands
            .create_subscription(Arc::clone(&gateway), unknown_owner)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn gateway_rejection_body_is_passed_through() {
        let (_, commands) = commands_with_owner().await;
        let mut gateway = MockAsaasGateway::new();
        gateway.expect_generate_subscription().returning(|_| {
            Err(GatewayError::Rejected {
                context: "create subscription".to_string(),
                status: 400,
                body: json!({ "errors": [{ "code": "invalid_customer" }] }),
            })
        });

        let err = commands
            .create_subscription(Arc::new(gateway), subscription_command("BOLETO"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.data()["errors"][0]["code"], json!("invalid_customer"));
    }

    #[tokio::test]
    async fn payment_for_owner_is_stamped_and_recorded() {
        let (store, commands) = commands_with_owner().await;
        let mut gateway = MockAsaasGateway::new();
        gateway.expect_create_payment().times(1).returning(|payment| {
            Ok(PaymentRecord {
                id: Some("pay_7".to_string()),
                status: Some(PaymentStatus::Pending),
                ..payment.clone()
            })
        });
        gateway
            .expect_update_payment()
            .withf(|id, payment| {
                id == "pay_7"
                    && payment.external_reference.as_deref() == Some("clients/c1/payments/pay_7")
            })
            .times(1)
            .returning(|_, payment| Ok(payment.clone()));

        let payment = commands
            .create_payment(
                &gateway,
                CreatePaymentCommand {
                    reference_path: Some("clients/c1".to_string()),
                    customer_id: Some("cus_1".to_string()),
                    billing_type: Some("PIX".to_string()),
                    value: Some(120.0),
                    due_date: Some("2024-08-01".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(payment.id.as_deref(), Some("pay_7"));
        let owner = store.get("clients/c1").await.unwrap().unwrap();
        let payments = owner.list("payments").unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0]["externalReference"], json!("clients/c1/payments/pay_7"));
        assert_eq!(owner.data["status"], json!("active"));
    }

    #[tokio::test]
    async fn cash_receipt_keeps_manual_extras_on_the_owner() {
        let (store, commands) = commands_with_owner().await;
        let mut fields = Map::new();
        fields.insert(
            "payments".to_string(),
            json!([{ "id": "pay_1", "status": "OVERDUE", "externalReference": "clients/c1/payments/pay_1" }]),
        );
        store.set_merge("clients/c1", fields).await.unwrap();

        let mut gateway = MockAsaasGateway::new();
        gateway
            .expect_receive_cash_payment()
            .withf(|id, receipt| {
                id == "pay_1" && receipt.payment_date == "2024-06-03" && !receipt.notify_customer
            })
            .returning(|id, receipt| {
                Ok(PaymentRecord {
                    id: Some(id.to_string()),
                    status: Some(PaymentStatus::ReceivedInCash),
                    value: Some(receipt.value),
                    external_reference: Some(format!("clients/c1/payments/{id}")),
                    ..Default::default()
                })
            });

        commands
            .receive_in_cash(
                &gateway,
                ReceiveInCashCommand {
                    payment_id: Some("pay_1".to_string()),
                    value: Some(90.0),
                    payment_date: Some("2024-06-03".to_string()),
                    payment_negotiation: Some("desconto".to_string()),
                    payment_type: Some("dinheiro".to_string()),
                    notify_customer: false,
                    responsible: Some(Responsible {
                        name: Some("Marta".to_string()),
                        email: None,
                        user_id: Some("u_1".to_string()),
                    }),
                },
            )
            .await
            .unwrap();

        let owner = store.get("clients/c1").await.unwrap().unwrap();
        let stored = &owner.list("payments").unwrap()[0];
        assert_eq!(stored["status"], json!("RECEIVED_IN_CASH"));
        assert_eq!(stored["manualPaymentExtras"]["negotiation"], json!("desconto"));
        assert_eq!(stored["manualPaymentExtras"]["type"], json!("dinheiro"));
        assert_eq!(owner.data["status"], json!("active"));
    }

    #[tokio::test]
    async fn delete_subscription_drops_the_local_entry() {
        let (store, commands) = commands_with_owner().await;
        let mut fields = Map::new();
        fields.insert("subscriptions".to_string(), json!([{ "id": "sub_1" }, { "id": "sub_2" }]));
        store.set_merge("clients/c1", fields).await.unwrap();

        let mut gateway = MockAsaasGateway::new();
        gateway
            .expect_delete_subscription()
            .times(1)
            .returning(|id| Ok(json!({ "deleted": true, "id": id })));

        commands
            .delete_subscription(&gateway, "sub_1", Some("clients/c1"))
            .await
            .unwrap();

        let owner = store.get("clients/c1").await.unwrap().unwrap();
        assert_eq!(owner.list("subscriptions").unwrap(), vec![json!({ "id": "sub_2" })]);
    }

    #[tokio::test]
    async fn customer_requires_name_document_and_reference() {
        let (_, commands) = commands_with_owner().await;
        let err = commands
            .create_customer(
                &MockAsaasGateway::new(),
                CreateCustomerCommand {
                    name: Some("Ana".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn customer_phone_is_sent_as_both_numbers() {
        let (_, commands) = commands_with_owner().await;
        let mut gateway = MockAsaasGateway::new();
        gateway
            .expect_create_customer()
            .withf(|customer| {
                customer.phone.as_deref() == Some("11999990000")
                    && customer.mobile_phone.as_deref() == Some("11999990000")
            })
            .returning(|_| Ok(json!({ "id": "cus_1" })));

        let created = commands
            .create_customer(
                &gateway,
                CreateCustomerCommand {
                    name: Some("Ana".to_string()),
                    cpf_cnpj: Some("24971563792".to_string()),
                    phone: Some("11999990000".to_string()),
                    external_reference: Some("clients/c1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created["id"], json!("cus_1"));
    }

    #[tokio::test]
    async fn payment_book_requires_month_and_year() {
        let (_, commands) = commands_with_owner().await;
        let err = commands
            .payment_book(&MockAsaasGateway::new(), "sub_1", Some(6), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn dates_are_normalized_to_calendar_days() {
        assert_eq!(normalize_date("2024-07-10").as_deref(), Some("2024-07-10"));
        assert_eq!(
            normalize_date("2024-07-10T23:30:00-03:00").as_deref(),
            Some("2024-07-11")
        );
        assert!(normalize_date("10/07/2024").is_none());
    }
}
