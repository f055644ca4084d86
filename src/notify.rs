//! Best-effort player notifications.
//!
//! Notifications always run after the financial transaction has committed.
//! Delivery failure is logged and dropped; it never retries indefinitely
//! and never rolls back money movement.

use crate::domain::UserId;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user: &UserId, title: &str, body: &str);
}

/// Default sink: structured log lines only.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, user: &UserId, title: &str, body: &str) {
        info!(user = %user, title = %title, body = %body, "notification");
    }
}

/// Fire-and-forget webhook sink for an external push service.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        WebhookNotifier {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, user: &UserId, title: &str, body: &str) {
        let payload = json!({
            "userId": user.as_str(),
            "title": title,
            "body": body,
        });

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                warn!(user = %user, status = %resp.status(), "Notification webhook rejected payload");
            }
            Err(e) => {
                warn!(user = %user, error = %e, "Notification webhook unreachable");
            }
        }
    }
}
