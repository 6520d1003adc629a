use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    axum_http::error_responses::AppError,
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::{record_store::RecordStore, webhook_ledger::WebhookLedger},
        value_objects::asaas_webhooks::AsaasPaymentWebhook,
    },
    infra::webhook_ledger::DocumentWebhookLedger,
    payments::asaas_client::{AsaasClient, AsaasClientConfig, AsaasEnvironment},
    usecases::{
        billing_commands::{
            BillingCommands, CreateCustomerCommand, CreatePaymentCommand,
            CreateSubAccountCommand, CreateSubscriptionCommand, ReceiveInCashCommand,
            TokenizeCardCommand,
        },
        owner_locks::OwnerLocks,
        reconciliation::{ReconcileSettings, ReconciliationEngine},
        webhook_ingestion::{WebhookIngestion, WebhookOutcome},
    },
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT/api/v1/asaas/subscriptions" \
//     -H "x-asaas-access-token: $ASAAS_ACCESS_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"customer_id":"cus_000005219613","reference_path":"clients/c1",
//          "subscription":{"value":250,"next_due_date":"2024-07-10","cycle":"MONTHLY","billing_type":"BOLETO"}}'

/// Credential for gateway calls made on behalf of the caller.
pub const GATEWAY_TOKEN_HEADER: &str = "x-asaas-access-token";
/// Header the gateway sets on callbacks when a webhook token is configured.
pub const WEBHOOK_TOKEN_HEADER: &str = "asaas-access-token";

#[derive(Clone)]
pub struct AsaasRouteState {
    config: Arc<DotEnvyConfig>,
    http: reqwest::Client,
    commands: Arc<BillingCommands<dyn RecordStore>>,
    ingestion: Arc<WebhookIngestion<dyn RecordStore, dyn WebhookLedger>>,
}

impl AsaasRouteState {
    pub fn new(config: Arc<DotEnvyConfig>, store: Arc<dyn RecordStore>) -> Self {
        let engine = ReconciliationEngine::new(
            Arc::clone(&store),
            Arc::new(OwnerLocks::new()),
            ReconcileSettings {
                page_size: config.reconcile.page_size,
                max_pages: config.reconcile.max_pages,
            },
        );
        let ledger: Arc<dyn WebhookLedger> = Arc::new(DocumentWebhookLedger::new(store));

        Self {
            config,
            http: reqwest::Client::new(),
            commands: Arc::new(BillingCommands::new(engine.clone())),
            ingestion: Arc::new(WebhookIngestion::new(engine, ledger)),
        }
    }

    fn gateway(&self, headers: &HeaderMap) -> Result<Arc<AsaasClient>, AppError> {
        let access_token = header_value(headers, GATEWAY_TOKEN_HEADER)
            .or_else(|| self.config.asaas.access_token.clone())
            .ok_or_else(|| {
                AppError::Unauthorized("payment gateway access token not provided".to_string())
            })?;

        let environment = if self.config.asaas.sandbox {
            AsaasEnvironment::Sandbox
        } else {
            AsaasEnvironment::Production
        };

        Ok(Arc::new(AsaasClient::with_http_client(
            self.http.clone(),
            AsaasClientConfig {
                environment,
                api_version: self.config.asaas.api_version.clone(),
                access_token,
            },
        )))
    }
}

pub fn routes(state: AsaasRouteState) -> Router {
    Router::new()
        .route("/webhooks/payments", post(payments_webhook))
        .route("/customers", post(create_customer))
        .route("/customers/:id", delete(delete_customer))
        .route("/sub-accounts", post(create_sub_account))
        .route("/credit-cards/tokenize", post(tokenize_credit_card))
        .route("/subscriptions", post(create_subscription))
        .route("/subscriptions/:id", delete(delete_subscription))
        .route("/subscriptions/:id/payment-book", get(payment_book))
        .route(
            "/subscriptions/:id/payments/refresh",
            post(refresh_subscription_payments),
        )
        .route("/payments", post(create_payment))
        .route("/payments/receive-in-cash", post(receive_in_cash))
        .route("/owners/bindings/repair", post(repair_pending_bindings))
        .with_state(state)
}

pub async fn payments_webhook(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Json(payload): Json<AsaasPaymentWebhook>,
) -> Response {
    if let Some(expected) = state.config.asaas.webhook_token.as_deref() {
        if header_value(&headers, WEBHOOK_TOKEN_HEADER).as_deref() != Some(expected) {
            warn!(event_id = %payload.id, "asaas_webhook: rejected delivery with bad token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    info!(
        event_id = %payload.id,
        event = %payload.event,
        "asaas_webhook: delivery received"
    );
    match state.ingestion.ingest(payload).await {
        Ok(WebhookOutcome::Processed) => StatusCode::OK.into_response(),
        Ok(outcome) => {
            info!(?outcome, "asaas_webhook: delivery acknowledged without changes");
            StatusCode::OK.into_response()
        }
        Err(err) => {
            let status = err.status_code();
            error!(
                status = status.as_u16(),
                error = %err,
                "asaas_webhook: delivery failed; gateway will retry"
            );
            (status, err.to_string()).into_response()
        }
    }
}

pub async fn create_customer(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Json(command): Json<CreateCustomerCommand>,
) -> Result<Response, AppError> {
    let gateway = state.gateway(&headers)?;
    let created = state.commands.create_customer(gateway.as_ref(), command).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn delete_customer(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Path(customer_id): Path<String>,
) -> Result<Response, AppError> {
    let gateway = state.gateway(&headers)?;
    let deleted = state
        .commands
        .delete_customer(gateway.as_ref(), &customer_id)
        .await?;
    Ok((StatusCode::OK, Json(deleted)).into_response())
}

pub async fn create_sub_account(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Json(command): Json<CreateSubAccountCommand>,
) -> Result<Response, AppError> {
    let gateway = state.gateway(&headers)?;
    let created = state
        .commands
        .create_sub_account(gateway.as_ref(), command)
        .await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn tokenize_credit_card(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Json(command): Json<TokenizeCardCommand>,
) -> Result<Response, AppError> {
    let gateway = state.gateway(&headers)?;
    let token = state
        .commands
        .tokenize_credit_card(gateway.as_ref(), command)
        .await?;
    Ok((StatusCode::CREATED, Json(token)).into_response())
}

pub async fn create_subscription(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Json(command): Json<CreateSubscriptionCommand>,
) -> Result<Response, AppError> {
    let gateway = state.gateway(&headers)?;
    // The payment refresh keeps running after the response is sent.
    let binding = state.commands.create_subscription(gateway, command).await?;
    Ok((StatusCode::CREATED, Json(binding.subscription)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub reference_path: Option<String>,
}

pub async fn delete_subscription(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Path(subscription_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, AppError> {
    let gateway = state.gateway(&headers)?;
    state
        .commands
        .delete_subscription(
            gateway.as_ref(),
            &subscription_id,
            query.reference_path.as_deref(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Deserialize)]
pub struct PaymentBookParams {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

pub async fn payment_book(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Path(subscription_id): Path<String>,
    Query(params): Query<PaymentBookParams>,
) -> Result<Response, AppError> {
    let gateway = state.gateway(&headers)?;
    let pdf = state
        .commands
        .payment_book(gateway.as_ref(), &subscription_id, params.month, params.year)
        .await?;
    Ok((StatusCode::OK, STANDARD.encode(pdf)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct OwnerRequest {
    pub reference_path: String,
}

pub async fn refresh_subscription_payments(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Path(subscription_id): Path<String>,
    Json(request): Json<OwnerRequest>,
) -> Result<Response, AppError> {
    let gateway = state.gateway(&headers)?;
    let payments = state
        .commands
        .refresh_subscription_payments(gateway.as_ref(), &request.reference_path, &subscription_id)
        .await?;
    Ok((StatusCode::OK, Json(payments)).into_response())
}

pub async fn create_payment(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Json(command): Json<CreatePaymentCommand>,
) -> Result<Response, AppError> {
    let gateway = state.gateway(&headers)?;
    let payment = state.commands.create_payment(gateway.as_ref(), command).await?;
    Ok((StatusCode::CREATED, Json(payment)).into_response())
}

pub async fn receive_in_cash(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Json(command): Json<ReceiveInCashCommand>,
) -> Result<Response, AppError> {
    let gateway = state.gateway(&headers)?;
    let payment = state
        .commands
        .receive_in_cash(gateway.as_ref(), command)
        .await?;
    Ok((StatusCode::OK, Json(payment)).into_response())
}

pub async fn repair_pending_bindings(
    State(state): State<AsaasRouteState>,
    headers: HeaderMap,
    Json(request): Json<OwnerRequest>,
) -> Result<Response, AppError> {
    let gateway = state.gateway(&headers)?;
    let repaired = state
        .commands
        .repair_pending_bindings(gateway.as_ref(), &request.reference_path)
        .await?;
    Ok((StatusCode::OK, Json(json!({ "repaired": repaired }))).into_response())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
