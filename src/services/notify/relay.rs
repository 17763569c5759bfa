use anyhow::Context;
use async_trait::async_trait;

use super::{Notification, NotificationDispatcher};

/// Posts notifications as JSON to an external relay (mail/SMS bridge run
/// next to the venue's site).
pub struct RelayNotifier {
    url: String,
    client: reqwest::Client,
}

impl RelayNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for RelayNotifier {
    async fn dispatch(&self, notification: &Notification) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .context("failed to reach notification relay")?
            .error_for_status()
            .context("notification relay returned error")?;

        Ok(())
    }
}
