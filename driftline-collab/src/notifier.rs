use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("Push provider responded with status {0}")]
    Status(u16),
}

/// An out-of-band message to a user's device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Notification {
    CohostInvited {
        room_name: String,
        user_id: String,
        host_uid: String,
    },
    PassPurchased {
        drift_id: String,
        user_id: String,
        title: String,
    },
    DriftPromoted {
        drift_id: String,
        host_uid: String,
        title: String,
        share_url: String,
    },
}

/// Delivers push notifications. Always called fire-and-forget.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Drops every notification
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        debug!("Dropping notification {:?}", notification);
        Ok(())
    }
}

/// Posts every notification as JSON to a push provider's webhook
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        Ok(())
    }
}

/// Keeps every notification in memory. Can be told to fail, like an unreachable provider.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<bool>,
}

impl MemoryNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        if *self.failing.lock() {
            return Err(NotifyError::Status(503));
        }

        self.sent.lock().push(notification);
        Ok(())
    }
}
