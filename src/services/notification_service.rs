/// Notification Service
///
/// Fire-and-forget delivery of synchronization failures to operators.
/// Delivery problems are logged and never propagated: a notification must
/// not change the outcome of the sync run that raised it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::services::erp::CallTrace;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncErrorNotice {
    pub proposal_id: Uuid,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<CallTrace>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_sync_error(&self, notice: &SyncErrorNotice);
}

/// Default sink: structured error log only.
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify_sync_error(&self, notice: &SyncErrorNotice) {
        tracing::error!(
            proposal_id = %notice.proposal_id,
            trace = ?notice.trace,
            "ERP sync failed: {}",
            notice.error
        );
    }
}

/// POSTs the notice as JSON to an operator webhook.
pub struct WebhookNotificationSink {
    url: String,
    http_client: Client,
}

impl WebhookNotificationSink {
    pub fn new(url: impl Into<String>) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            url: url.into(),
            http_client,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn notify_sync_error(&self, notice: &SyncErrorNotice) {
        LogNotificationSink.notify_sync_error(notice).await;

        match self.http_client.post(&self.url).json(notice).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(proposal_id = %notice.proposal_id, "Sync error webhook delivered");
            }
            Ok(response) => {
                tracing::warn!(
                    proposal_id = %notice.proposal_id,
                    "Sync error webhook rejected with status {}",
                    response.status()
                );
            }
            Err(e) => {
                tracing::warn!(proposal_id = %notice.proposal_id, "Sync error webhook failed: {}", e);
            }
        }
    }
}
