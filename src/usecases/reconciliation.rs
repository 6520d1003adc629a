use std::sync::Arc;

use anyhow::anyhow;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    domain::{
        entities::documents::DocumentSnapshot,
        repositories::record_store::RecordStore,
        value_objects::{
            enums::{
                owner_statuses::OwnerStatus, payment_statuses::PaymentStatus,
                webhook_events::UpdateMode,
            },
            external_reference::{
                ExternalReference, OwnerPath, PAYMENTS_FIELD, ReferenceError, SUBSCRIPTIONS_FIELD,
            },
            payments::{PaymentRecord, merge_payment_record},
            subscriptions::{PendingBinding, SubscriptionRecord},
        },
    },
    payments::{asaas_client::GatewayError, asaas_gateway::AsaasGateway},
    usecases::owner_locks::{OwnerGuard, OwnerLocks},
};

pub const STATUS_FIELD: &str = "status";
pub const SUBSCRIPTION_BINDINGS_FIELD: &str = "subscriptionBindings";

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("record has no {0}")]
    MissingReference(&'static str),
    #[error("subscription has no id")]
    MissingId,
    #[error(transparent)]
    InvalidReference(#[from] ReferenceError),
    #[error("owner document not found: {0}")]
    OwnerNotFound(String),
    #[error("gateway call failed: {0}")]
    GatewayCallFailed(#[from] GatewayError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ReconcileError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReconcileError::MissingReference(_) | ReconcileError::MissingId => {
                StatusCode::BAD_REQUEST
            }
            ReconcileError::InvalidReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ReconcileError::OwnerNotFound(_) => StatusCode::NOT_FOUND,
            ReconcileError::GatewayCallFailed(err) => err.status_code(),
            ReconcileError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// `limit` sent on each subscription-payments page request.
    pub page_size: u32,
    /// Stop after this many pages even if the gateway reports more.
    pub max_pages: Option<u32>,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: None,
        }
    }
}

/// Result of binding a subscription to its owner. `refresh` resolves once the
/// subscription's payments have been pulled into the owner; callers may
/// detach it.
pub struct SubscriptionBinding {
    pub subscription: SubscriptionRecord,
    pub refresh: JoinHandle<ReconcileResult<Vec<Value>>>,
}

/// Folds gateway state into owner documents.
pub struct ReconciliationEngine<S>
where
    S: RecordStore + ?Sized,
{
    store: Arc<S>,
    locks: Arc<OwnerLocks>,
    settings: ReconcileSettings,
}

impl<S> Clone for ReconciliationEngine<S>
where
    S: RecordStore + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            settings: self.settings,
        }
    }
}

impl<S> ReconciliationEngine<S>
where
    S: RecordStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, locks: Arc<OwnerLocks>, settings: ReconcileSettings) -> Self {
        Self {
            store,
            locks,
            settings,
        }
    }

    pub async fn lock_owner(&self, owner: &OwnerPath) -> OwnerGuard {
        self.locks.lock(owner).await
    }

    /// Routes `payment` to its owner by external reference and applies `mode`
    /// to the target list. Returns the rewritten list, or `None` when an
    /// update or delete found no list to touch.
    pub async fn apply_payment_update(
        &self,
        payment: PaymentRecord,
        mode: UpdateMode,
    ) -> ReconcileResult<Option<Vec<Value>>> {
        let reference = payment_reference(&payment)?;
        let _guard = self.locks.lock(reference.owner()).await;
        self.apply_payment_update_locked(&reference, payment, mode).await
    }

    /// Same as [`apply_payment_update`](Self::apply_payment_update) for a
    /// caller that already holds the owner's guard.
    pub async fn apply_payment_update_locked(
        &self,
        reference: &ExternalReference,
        payment: PaymentRecord,
        mode: UpdateMode,
    ) -> ReconcileResult<Option<Vec<Value>>> {
        let owner = reference.owner();
        let payment_id = payment
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(ReconcileError::MissingReference("id"))?;

        let snapshot = self.load_owner(owner).await?;
        let field = match mode {
            UpdateMode::Create => PAYMENTS_FIELD,
            UpdateMode::Update | UpdateMode::Delete => reference.field().unwrap_or(PAYMENTS_FIELD),
        };

        let updated = fold_list(snapshot.list(field), payment, &payment_id, mode)?;

        let mut fields = Map::new();
        if let Some(list) = &updated {
            fields.insert(field.to_string(), Value::Array(list.clone()));
        }
        if let Some(status) = derive_owner_status(updated.as_deref(), snapshot.status()) {
            fields.insert(STATUS_FIELD.to_string(), Value::String(status.to_string()));
        }

        if !fields.is_empty() {
            self.write(owner, fields).await?;
        }

        info!(
            %owner,
            field,
            %mode,
            payment_id = %payment_id,
            list_len = updated.as_ref().map(Vec::len),
            "reconciliation: payment update applied"
        );
        Ok(updated)
    }

    /// Stamps `<owner>/subscriptions/<id>` on the subscription at the gateway
    /// and records it on the owner, then pulls its payments in the background.
    ///
    /// A `subscriptionBindings.<id>` marker is persisted before the gateway
    /// call and cleared in the same write that appends the subscription, so an
    /// interrupted binding can be finished by
    /// [`repair_pending_bindings`](Self::repair_pending_bindings).
    pub async fn bind_subscription_reference<G>(
        &self,
        gateway: Arc<G>,
        owner: &OwnerPath,
        subscription: SubscriptionRecord,
    ) -> ReconcileResult<SubscriptionBinding>
    where
        G: AsaasGateway + ?Sized + 'static,
    {
        let subscription_id = subscription
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(ReconcileError::MissingId)?;

        let stamped = SubscriptionRecord {
            external_reference: Some(
                owner
                    .record_reference(SUBSCRIPTIONS_FIELD, &subscription_id)
                    .to_string(),
            ),
            ..subscription
        };

        {
            let _guard = self.locks.lock(owner).await;
            let snapshot = self.load_owner(owner).await?;
            let mut bindings = pending_bindings(&snapshot);

            bindings.insert(
                subscription_id.clone(),
                to_json(&PendingBinding {
                    subscription: stamped.clone(),
                    bound_at_gateway: false,
                })?,
            );
            self.write_bindings(owner, &bindings).await?;

            if let Err(err) = gateway
                .update_subscription(&subscription_id, &stamped)
                .await
            {
                error!(
                    %owner,
                    %subscription_id,
                    error = ?err,
                    "reconciliation: gateway refused the subscription back-reference"
                );
                bindings.remove(&subscription_id);
                if let Err(cleanup) = self.write_bindings(owner, &bindings).await {
                    error!(
                        %owner,
                        %subscription_id,
                        error = ?cleanup,
                        "reconciliation: failed to clear binding marker after gateway refusal"
                    );
                }
                return Err(ReconcileError::GatewayCallFailed(err));
            }

            bindings.insert(
                subscription_id.clone(),
                to_json(&PendingBinding {
                    subscription: stamped.clone(),
                    bound_at_gateway: true,
                })?,
            );
            self.write_bindings(owner, &bindings).await?;

            let subscriptions = replace_by_id(
                snapshot.list(SUBSCRIPTIONS_FIELD).unwrap_or_default(),
                &subscription_id,
                to_json(&stamped)?,
            );
            bindings.remove(&subscription_id);

            let mut fields = Map::new();
            fields.insert(SUBSCRIPTIONS_FIELD.to_string(), Value::Array(subscriptions));
            fields.insert(
                SUBSCRIPTION_BINDINGS_FIELD.to_string(),
                Value::Object(bindings),
            );
            self.write(owner, fields).await?;
        }

        info!(
            %owner,
            %subscription_id,
            "reconciliation: subscription bound to owner"
        );

        let refresh = self.spawn_refresh(gateway, owner.clone(), subscription_id);
        Ok(SubscriptionBinding {
            subscription: stamped,
            refresh,
        })
    }

    fn spawn_refresh<G>(
        &self,
        gateway: Arc<G>,
        owner: OwnerPath,
        subscription_id: String,
    ) -> JoinHandle<ReconcileResult<Vec<Value>>>
    where
        G: AsaasGateway + ?Sized + 'static,
    {
        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine
                .refresh_subscription_payments(gateway.as_ref(), &owner, &subscription_id)
                .await;
            if let Err(err) = &result {
                warn!(
                    %owner,
                    %subscription_id,
                    error = ?err,
                    "reconciliation: background payment refresh failed; binding kept"
                );
            }
            result
        })
    }

    /// Pulls every page of a subscription's payments, re-stamps the ones still
    /// awaiting settlement with `<owner>/payments/<id>`, and merges them into
    /// the owner's `payments` list by id.
    pub async fn refresh_subscription_payments<G>(
        &self,
        gateway: &G,
        owner: &OwnerPath,
        subscription_id: &str,
    ) -> ReconcileResult<Vec<Value>>
    where
        G: AsaasGateway + ?Sized,
    {
        let fetched = self
            .fetch_subscription_payments(gateway, owner, subscription_id)
            .await?;

        let _guard = self.locks.lock(owner).await;
        let snapshot = self.load_owner(owner).await?;
        let mut payments = snapshot.list(PAYMENTS_FIELD).unwrap_or_default();

        for payment in fetched {
            let Some(payment_id) = payment.id.clone() else {
                warn!(
                    %owner,
                    %subscription_id,
                    "reconciliation: skipping subscription payment without id"
                );
                continue;
            };
            let merged = match payments
                .iter()
                .position(|item| item_id(item) == Some(payment_id.as_str()))
            {
                Some(index) => {
                    let stored: PaymentRecord = from_json(payments[index].clone())?;
                    payments[index] = to_json(&merge_payment_record(payment, stored))?;
                    continue;
                }
                None => to_json(&payment)?,
            };
            payments.push(merged);
        }

        let mut fields = Map::new();
        fields.insert(PAYMENTS_FIELD.to_string(), Value::Array(payments.clone()));
        self.write(owner, fields).await?;

        info!(
            %owner,
            %subscription_id,
            payments = payments.len(),
            "reconciliation: subscription payments refreshed"
        );
        Ok(payments)
    }

    async fn fetch_subscription_payments<G>(
        &self,
        gateway: &G,
        owner: &OwnerPath,
        subscription_id: &str,
    ) -> ReconcileResult<Vec<PaymentRecord>>
    where
        G: AsaasGateway + ?Sized,
    {
        let mut fetched = Vec::new();
        let mut offset = 0u32;
        let mut pages = 0u32;

        loop {
            let page = gateway
                .get_subscription_payments(subscription_id, offset, self.settings.page_size)
                .await
                .map_err(|err| {
                    error!(
                        %owner,
                        %subscription_id,
                        offset,
                        error = ?err,
                        "reconciliation: failed to list subscription payments"
                    );
                    ReconcileError::GatewayCallFailed(err)
                })?;
            pages += 1;

            let page_len = page.data.len() as u32;
            for payment in page.data {
                fetched.push(self.restamp(gateway, owner, payment).await);
            }

            if !page.has_more || page_len == 0 {
                break;
            }
            if self.settings.max_pages.is_some_and(|max| pages >= max) {
                warn!(
                    %owner,
                    %subscription_id,
                    pages,
                    total_count = page.total_count,
                    "reconciliation: page cap reached; remaining subscription payments skipped"
                );
                break;
            }
            offset += page_len;
        }

        Ok(fetched)
    }

    async fn restamp<G>(
        &self,
        gateway: &G,
        owner: &OwnerPath,
        payment: PaymentRecord,
    ) -> PaymentRecord
    where
        G: AsaasGateway + ?Sized,
    {
        let awaiting = payment
            .status
            .as_ref()
            .is_some_and(PaymentStatus::awaits_settlement);
        let Some(payment_id) = payment.id.clone().filter(|_| awaiting) else {
            return payment;
        };

        let stamped = PaymentRecord {
            external_reference: Some(
                owner
                    .record_reference(PAYMENTS_FIELD, &payment_id)
                    .to_string(),
            ),
            ..payment.clone()
        };
        match gateway.update_payment(&payment_id, &stamped).await {
            Ok(updated) => updated,
            Err(err) => {
                warn!(
                    %owner,
                    %payment_id,
                    error = ?err,
                    "reconciliation: failed to re-stamp payment reference; keeping gateway copy"
                );
                payment
            }
        }
    }

    /// Finishes bindings interrupted between the marker write and the list
    /// append. Returns the subscription ids that were completed.
    pub async fn repair_pending_bindings<G>(
        &self,
        gateway: &G,
        owner: &OwnerPath,
    ) -> ReconcileResult<Vec<String>>
    where
        G: AsaasGateway + ?Sized,
    {
        let repaired = {
            let _guard = self.locks.lock(owner).await;
            let snapshot = self.load_owner(owner).await?;
            let mut bindings = pending_bindings(&snapshot);
            if bindings.is_empty() {
                return Ok(Vec::new());
            }

            let mut subscriptions = snapshot.list(SUBSCRIPTIONS_FIELD).unwrap_or_default();
            let mut repaired = Vec::new();

            for (subscription_id, marker) in bindings.clone() {
                let marker: PendingBinding = match serde_json::from_value(marker) {
                    Ok(marker) => marker,
                    Err(err) => {
                        warn!(
                            %owner,
                            %subscription_id,
                            error = %err,
                            "reconciliation: dropping unreadable binding marker"
                        );
                        bindings.remove(&subscription_id);
                        continue;
                    }
                };

                if !marker.bound_at_gateway {
                    if let Err(err) = gateway
                        .update_subscription(&subscription_id, &marker.subscription)
                        .await
                    {
                        warn!(
                            %owner,
                            %subscription_id,
                            error = ?err,
                            "reconciliation: binding still pending; gateway refused back-reference"
                        );
                        continue;
                    }
                }

                subscriptions =
                    replace_by_id(subscriptions, &subscription_id, to_json(&marker.subscription)?);
                bindings.remove(&subscription_id);
                repaired.push(subscription_id);
            }

            let mut fields = Map::new();
            fields.insert(SUBSCRIPTIONS_FIELD.to_string(), Value::Array(subscriptions));
            fields.insert(
                SUBSCRIPTION_BINDINGS_FIELD.to_string(),
                Value::Object(bindings),
            );
            self.write(owner, fields).await?;
            repaired
        };

        for subscription_id in &repaired {
            if let Err(err) = self
                .refresh_subscription_payments(gateway, owner, subscription_id)
                .await
            {
                warn!(
                    %owner,
                    %subscription_id,
                    error = ?err,
                    "reconciliation: payment refresh after repair failed"
                );
            }
        }

        info!(
            %owner,
            repaired = repaired.len(),
            "reconciliation: pending bindings repaired"
        );
        Ok(repaired)
    }

    /// Drops a subscription from the owner's list. `None` when the owner has
    /// no subscriptions list.
    pub async fn remove_subscription(
        &self,
        owner: &OwnerPath,
        subscription_id: &str,
    ) -> ReconcileResult<Option<Vec<Value>>> {
        let _guard = self.locks.lock(owner).await;
        let snapshot = self.load_owner(owner).await?;

        let Some(mut subscriptions) = snapshot.list(SUBSCRIPTIONS_FIELD) else {
            return Ok(None);
        };
        subscriptions.retain(|item| item_id(item) != Some(subscription_id));

        let mut fields = Map::new();
        fields.insert(
            SUBSCRIPTIONS_FIELD.to_string(),
            Value::Array(subscriptions.clone()),
        );
        self.write(owner, fields).await?;

        info!(%owner, %subscription_id, "reconciliation: subscription removed from owner");
        Ok(Some(subscriptions))
    }

    pub async fn load_owner(&self, owner: &OwnerPath) -> ReconcileResult<DocumentSnapshot> {
        self.find_owner(owner)
            .await?
            .ok_or_else(|| ReconcileError::OwnerNotFound(owner.to_string()))
    }

    pub async fn find_owner(&self, owner: &OwnerPath) -> ReconcileResult<Option<DocumentSnapshot>> {
        self.store
            .get(&owner.to_string())
            .await
            .map_err(|err| {
                error!(
                    %owner,
                    db_error = ?err,
                    "reconciliation: failed to load owner document"
                );
                ReconcileError::Internal(err)
            })
    }

    async fn write(&self, owner: &OwnerPath, fields: Map<String, Value>) -> ReconcileResult<()> {
        self.store
            .set_merge(&owner.to_string(), fields)
            .await
            .map_err(|err| {
                error!(
                    %owner,
                    db_error = ?err,
                    "reconciliation: failed to merge-write owner document"
                );
                ReconcileError::Internal(err)
            })
    }

    async fn write_bindings(
        &self,
        owner: &OwnerPath,
        bindings: &Map<String, Value>,
    ) -> ReconcileResult<()> {
        let mut fields = Map::new();
        fields.insert(
            SUBSCRIPTION_BINDINGS_FIELD.to_string(),
            Value::Object(bindings.clone()),
        );
        self.write(owner, fields).await
    }
}

/// Owner status after a list mutation: any overdue record wins; otherwise the
/// owner is active unless it was canceled, in which case status is left alone.
pub fn derive_owner_status(
    list: Option<&[Value]>,
    previous: Option<OwnerStatus>,
) -> Option<OwnerStatus> {
    let overdue = list.is_some_and(|items| {
        items.iter().any(|item| {
            item.get(STATUS_FIELD)
                .and_then(Value::as_str)
                .is_some_and(|status| PaymentStatus::from_str(status) == PaymentStatus::Overdue)
        })
    });

    if overdue {
        Some(OwnerStatus::Overdue)
    } else if previous == Some(OwnerStatus::Canceled) {
        None
    } else {
        Some(OwnerStatus::Active)
    }
}

pub fn payment_reference(payment: &PaymentRecord) -> ReconcileResult<ExternalReference> {
    let raw = payment
        .external_reference
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .ok_or(ReconcileError::MissingReference("externalReference"))?;
    if payment.id.as_deref().is_none_or(str::is_empty) {
        return Err(ReconcileError::MissingReference("id"));
    }
    Ok(ExternalReference::parse(raw)?)
}

fn fold_list(
    existing: Option<Vec<Value>>,
    payment: PaymentRecord,
    payment_id: &str,
    mode: UpdateMode,
) -> ReconcileResult<Option<Vec<Value>>> {
    match mode {
        UpdateMode::Create => Ok(Some(replace_by_id(
            existing.unwrap_or_default(),
            payment_id,
            to_json(&payment)?,
        ))),
        UpdateMode::Delete => Ok(existing.map(|mut list| {
            list.retain(|item| item_id(item) != Some(payment_id));
            list
        })),
        UpdateMode::Update => existing
            .map(|list| {
                list.into_iter()
                    .map(|item| {
                        if item_id(&item) == Some(payment_id) {
                            let stored: PaymentRecord = from_json(item)?;
                            to_json(&merge_payment_record(payment.clone(), stored))
                        } else {
                            Ok(item)
                        }
                    })
                    .collect::<ReconcileResult<Vec<_>>>()
            })
            .transpose(),
    }
}

/// Removes every entry with `id`, then appends `record`.
fn replace_by_id(mut list: Vec<Value>, id: &str, record: Value) -> Vec<Value> {
    list.retain(|item| item_id(item) != Some(id));
    list.push(record);
    list
}

fn pending_bindings(snapshot: &DocumentSnapshot) -> Map<String, Value> {
    match snapshot.data.get(SUBSCRIPTION_BINDINGS_FIELD) {
        Some(Value::Object(bindings)) => bindings.clone(),
        _ => Map::new(),
    }
}

fn item_id(item: &Value) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

fn to_json<T: Serialize>(value: &T) -> ReconcileResult<Value> {
    serde_json::to_value(value).map_err(|err| ReconcileError::Internal(anyhow!(err)))
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> ReconcileResult<T> {
    serde_json::from_value(value).map_err(|err| ReconcileError::Internal(anyhow!(err)))
}
