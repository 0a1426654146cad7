//! Webhook delivery for alerts
//!
//! Delivery is best-effort: one POST, no retry. Callers log and drop errors.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Prefix prepended to every webhook message
pub const MESSAGE_PREFIX: &str = "[Bounty Board Health]";

/// Default timeout for a webhook POST
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct WebhookPayload {
    text: String,
    timestamp: String,
}

/// Sends alert messages to an optional webhook
#[derive(Debug, Clone)]
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl Notifier {
    /// Create a notifier. With no URL, alerts are only logged.
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
            timeout: DEFAULT_WEBHOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    /// POST the message to the webhook. `Ok(false)` when none is configured.
    pub async fn send(&self, message: &str, now: DateTime<Utc>) -> Result<bool, NotifierError> {
        let Some(url) = self.webhook_url.as_deref() else {
            return Ok(false);
        };

        let payload = WebhookPayload {
            text: format!("{} {}", MESSAGE_PREFIX, message),
            timestamp: now.to_rfc3339(),
        };

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifierError::Webhook(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotifierError::Status(response.status().as_u16()));
        }

        tracing::debug!(url = %url, "Webhook notification sent");
        Ok(true)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Webhook returned status {0}")]
    Status(u16),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_without_webhook_sends_nothing() {
        let notifier = Notifier::new(None);
        let sent = tokio_test::assert_ok!(notifier.send("down", Utc::now()).await);
        assert!(!sent);
    }

    #[tokio::test]
    async fn test_blank_url_is_treated_as_unset() {
        let notifier = Notifier::new(Some("  ".to_string()));
        assert!(notifier.webhook_url().is_none());
    }

    #[tokio::test]
    async fn test_posts_prefixed_payload() {
        let server = MockServer::start().await;
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "text": "[Bounty Board Health] /api/stats: HTTP 500",
                "timestamp": "2024-01-02T03:04:05+00:00",
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = Notifier::new(Some(format!("{}/hook", server.uri())));
        let sent = notifier.send("/api/stats: HTTP 500", now).await.unwrap();
        assert!(sent);
    }

    #[tokio::test]
    async fn test_non_2xx_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let notifier = Notifier::new(Some(server.uri()));
        let err = notifier.send("x", Utc::now()).await.unwrap_err();
        assert!(matches!(err, NotifierError::Status(503)));
    }
}
