//! Alert delivery
//!
//! The core only talks to the [`Notifier`] capability; transports live
//! behind it so the channel can be swapped or faked in tests. Every
//! transport failure comes back as a [`NotifyError`] value.

mod log;
mod smtp;
mod webhook;

pub use self::log::LogNotifier;
pub use smtp::{classify_reply_code, SmtpConfig, SmtpNotifier};
pub use webhook::{WebhookConfig, WebhookNotifier, WebhookPayload};

use crate::error::NotifyError;
use crate::models::AlertMessage;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Capability for delivering an alert through an external channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` once; never retried by the caller
    async fn notify(&self, message: &AlertMessage) -> Result<(), NotifyError>;

    /// Channel name used in logs and metrics
    fn channel(&self) -> &'static str;
}

/// Transport selection; the first configured channel wins
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifierSettings {
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

impl NotifierSettings {
    /// Build the configured transport, falling back to the log channel
    pub fn build(&self) -> Result<Arc<dyn Notifier>> {
        if let Some(smtp) = &self.smtp {
            info!(host = %smtp.host, port = smtp.port, "Using SMTP notifier");
            return Ok(Arc::new(SmtpNotifier::new(smtp)?));
        }
        if let Some(webhook) = &self.webhook {
            info!("Using webhook notifier");
            return Ok(Arc::new(WebhookNotifier::new(webhook)?));
        }
        info!("No notification transport configured, alerts go to the log");
        Ok(Arc::new(LogNotifier::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_settings_fall_back_to_log() {
        let notifier = NotifierSettings::default().build().unwrap();
        assert_eq!(notifier.channel(), "log");
    }

    #[test]
    fn test_smtp_takes_precedence() {
        let settings = NotifierSettings {
            smtp: Some(SmtpConfig::plaintext("127.0.0.1", 2525, "ops@example.com", "secret")),
            webhook: Some(WebhookConfig::new("http://127.0.0.1:9/hook")),
        };
        assert_eq!(settings.build().unwrap().channel(), "smtp");
    }

    #[test]
    fn test_webhook_selected_without_smtp() {
        let settings = NotifierSettings {
            smtp: None,
            webhook: Some(WebhookConfig::new("http://127.0.0.1:9/hook")),
        };
        assert_eq!(settings.build().unwrap().channel(), "webhook");
    }
}
