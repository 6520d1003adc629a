use anyhow::Result;
use async_trait::async_trait;

use crate::domain::entities::asaas_webhooks::ProcessedWebhookEvent;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookLedger: Send + Sync {
    async fn find(&self, event_id: &str) -> Result<Option<ProcessedWebhookEvent>>;
    async fn append(&self, entry: ProcessedWebhookEvent) -> Result<()>;
}
