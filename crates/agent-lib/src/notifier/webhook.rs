//! JSON webhook transport (chat relays, incident tools)

use super::Notifier;
use crate::error::NotifyError;
use crate::models::AlertMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Deserialize)]
pub struct WebhookConfig {
    pub url: String,

    /// Sent as `Authorization: Bearer <token>` when set
    #[serde(default)]
    pub bearer_token: Option<String>,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("url", &self.url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Body posted to the webhook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookPayload {
    pub subject: String,
    pub body: String,
    pub recipient: String,
    /// Subject and body joined, for receivers that only render one field
    pub text: String,
}

impl From<&AlertMessage> for WebhookPayload {
    fn from(message: &AlertMessage) -> Self {
        Self {
            subject: message.subject.clone(),
            body: message.body.clone(),
            recipient: message.recipient.clone(),
            text: format!("{}\n{}", message.subject, message.body),
        }
    }
}

pub struct WebhookNotifier {
    client: Client,
    url: String,
    bearer_token: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: config.url.clone(),
            bearer_token: config.bearer_token.clone(),
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> NotifyError {
        if err.is_timeout() {
            NotifyError::Timeout(self.timeout)
        } else if err.is_builder() {
            NotifyError::InvalidRecipient(err.to_string())
        } else {
            NotifyError::ConnectionFailure(err.to_string())
        }
    }
}

fn classify_status(status: StatusCode, body: String) -> NotifyError {
    let cause = format!("webhook returned {}: {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NotifyError::AuthFailure(cause),
        StatusCode::NOT_FOUND | StatusCode::GONE => NotifyError::InvalidRecipient(cause),
        _ => NotifyError::ConnectionFailure(cause),
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&WebhookPayload::from(message));
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        debug!(status = %status, "Webhook accepted alert");
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn message() -> AlertMessage {
        AlertMessage::new("AIOps Alert", "Disk usage is high", "#ops")
    }

    #[tokio::test]
    async fn test_delivers_json_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("authorization", "Bearer t0ken")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "subject": "AIOps Alert",
                "recipient": "#ops"
            })))
            .with_status(200)
            .create_async()
            .await;

        let mut config = WebhookConfig::new(format!("{}/hook", server.url()));
        config.bearer_token = Some("t0ken".to_string());
        let notifier = WebhookNotifier::new(&config).unwrap();

        notifier.notify(&message()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .with_status(401)
            .with_body("bad token")
            .create_async()
            .await;

        let notifier =
            WebhookNotifier::new(&WebhookConfig::new(format!("{}/hook", server.url()))).unwrap();

        let err = notifier.notify(&message()).await.unwrap_err();
        assert!(matches!(err, NotifyError::AuthFailure(ref cause) if cause.contains("bad token")));
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_invalid_recipient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .with_status(404)
            .create_async()
            .await;

        let notifier =
            WebhookNotifier::new(&WebhookConfig::new(format!("{}/hook", server.url()))).unwrap();

        let err = notifier.notify(&message()).await.unwrap_err();
        assert!(matches!(err, NotifyError::InvalidRecipient(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_connection_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .with_status(503)
            .create_async()
            .await;

        let notifier =
            WebhookNotifier::new(&WebhookConfig::new(format!("{}/hook", server.url()))).unwrap();

        let err = notifier.notify(&message()).await.unwrap_err();
        assert!(matches!(err, NotifyError::ConnectionFailure(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let notifier =
            WebhookNotifier::new(&WebhookConfig::new(format!("http://127.0.0.1:{}/hook", port)))
                .unwrap();

        let err = notifier.notify(&message()).await.unwrap_err();
        assert!(matches!(err, NotifyError::ConnectionFailure(_)));
    }

    #[tokio::test]
    async fn test_unresponsive_endpoint_times_out() {
        // Accept the connection and never answer
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let mut config = WebhookConfig::new(format!("http://127.0.0.1:{}/hook", port));
        config.timeout_seconds = 1;
        let notifier = WebhookNotifier::new(&config).unwrap();

        let err = notifier.notify(&message()).await.unwrap_err();
        assert!(
            matches!(err, NotifyError::Timeout(t) if t == Duration::from_secs(1)),
            "got {err:?}"
        );
    }

    #[test]
    fn test_payload_text_joins_subject_and_body() {
        let payload = WebhookPayload::from(&message());
        assert_eq!(payload.text, "AIOps Alert\nDisk usage is high");
    }
}
