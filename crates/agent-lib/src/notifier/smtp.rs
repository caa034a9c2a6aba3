//! SMTP mail relay transport
//!
//! Connects over STARTTLS, authenticates with injected credentials and
//! sends one plain-text message to one recipient.

use super::Notifier;
use crate::error::NotifyError;
use crate::models::AlertMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Mail relay settings; credentials are always injected, never defaulted
#[derive(Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    pub password: String,

    /// Sender address; the username when unset
    #[serde(default)]
    pub from: Option<String>,

    /// Upgrade the session with STARTTLS before authenticating
    #[serde(default = "default_starttls")]
    pub starttls: bool,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    10
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: username.into(),
            password: password.into(),
            from: None,
            starttls: default_starttls(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Unencrypted session, for local relays and tests
    pub fn plaintext(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            port,
            starttls: false,
            ..Self::new(host, username, password)
        }
    }

    pub fn sender(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.username)
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("starttls", &self.starttls)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    timeout: Duration,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .sender()
            .parse()
            .with_context(|| format!("Invalid sender address {:?}", config.sender()))?;
        let timeout = Duration::from_secs(config.timeout_seconds);

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .with_context(|| format!("Failed to set up STARTTLS for {}", config.host))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        // lettre's own per-command timeout surfaces as a generic response
        // error, so the whole exchange is bounded in `notify` instead
        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(None)
            .build();

        Ok(Self {
            transport,
            from,
            timeout,
        })
    }

    fn classify(&self, err: lettre::transport::smtp::Error) -> NotifyError {
        if err.is_timeout() {
            return NotifyError::Timeout(self.timeout);
        }
        let cause = err.to_string();
        match err
            .status()
            .and_then(|code| code.to_string().parse::<u16>().ok())
        {
            Some(code) => classify_reply_code(code, cause),
            None => NotifyError::ConnectionFailure(cause),
        }
    }
}

/// Map an SMTP reply code to a delivery failure
pub fn classify_reply_code(code: u16, cause: String) -> NotifyError {
    match code {
        // 530 auth required, 534 mechanism too weak, 535 credentials invalid
        530 | 534 | 535 => NotifyError::AuthFailure(cause),
        // mailbox unavailable / not local / name not allowed
        550 | 551 | 553 => NotifyError::InvalidRecipient(cause),
        _ => NotifyError::ConnectionFailure(cause),
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        let to: Mailbox = message.recipient.parse().map_err(|e| {
            NotifyError::InvalidRecipient(format!("{:?}: {e}", message.recipient))
        })?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| NotifyError::InvalidRecipient(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.transport.send(email))
            .await
            .map_err(|_| NotifyError::Timeout(self.timeout))?
            .map_err(|e| self.classify(e))?;
        debug!(code = %response.code(), "SMTP relay accepted message");
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "smtp"
    }
}
