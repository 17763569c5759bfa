pub mod relay;

use async_trait::async_trait;
use serde::Serialize;

pub use relay::RelayNotifier;

/// A customer-facing message about a booking or payment. Delivery is
/// best-effort: callers log failures and move on.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub event: String,
    pub recipient: String,
    pub detail: serde_json::Value,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Default dispatcher: writes the notification to the log and nothing else.
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn dispatch(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            event = %notification.event,
            recipient = %notification.recipient,
            "notification (log only)"
        );
        Ok(())
    }
}
