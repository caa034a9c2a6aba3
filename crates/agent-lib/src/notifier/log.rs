//! Dry-run channel that writes alerts to the log

use super::Notifier;
use crate::error::NotifyError;
use crate::models::AlertMessage;
use async_trait::async_trait;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        warn!(
            event = "alert_notification",
            recipient = %message.recipient,
            subject = %message.subject,
            body = %message.body,
            "Alert raised"
        );
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let message = AlertMessage::new("AIOps Alert", "CPU usage is high", "ops@example.com");
        assert!(LogNotifier::new().notify(&message).await.is_ok());
    }
}
