//! Deliver a one-off alert through the configured channel

use anyhow::Result;
use opswatch_lib::{
    notifier::{NotifierSettings, SmtpConfig, WebhookConfig},
    AlertMessage,
};
use std::time::Duration;

use crate::output::{describe_notify_error, print_error, print_info, print_success};

/// Transport flags gathered from the command line and environment
#[derive(Debug, Clone, Default)]
pub struct TransportArgs {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_plaintext: bool,
    pub webhook_url: Option<String>,
    pub webhook_token: Option<String>,
}

impl TransportArgs {
    pub fn settings(&self) -> Result<NotifierSettings> {
        let smtp = match &self.smtp_host {
            Some(host) => {
                let (Some(username), Some(password)) = (&self.smtp_username, &self.smtp_password)
                else {
                    anyhow::bail!("SMTP host given without --smtp-username/--smtp-password");
                };
                let mut smtp = SmtpConfig::new(host, username, password);
                smtp.port = self.smtp_port;
                smtp.from = self.smtp_from.clone();
                smtp.starttls = !self.smtp_plaintext;
                Some(smtp)
            }
            None => None,
        };

        let webhook = self.webhook_url.as_ref().map(|url| {
            let mut webhook = WebhookConfig::new(url);
            webhook.bearer_token = self.webhook_token.clone();
            webhook
        });

        Ok(NotifierSettings { smtp, webhook })
    }
}

/// Send `subject`/`body` to `recipient`; a delivery failure is an error exit
pub async fn send_test_alert(
    transport: &TransportArgs,
    recipient: &str,
    subject: &str,
    body: &str,
    timeout: Duration,
) -> Result<()> {
    let notifier = transport.settings()?.build()?;
    print_info(&format!(
        "Sending test alert to {} via {}",
        recipient,
        notifier.channel()
    ));

    let message = AlertMessage::new(subject, body, recipient);
    let result = match tokio::time::timeout(timeout, notifier.notify(&message)).await {
        Ok(result) => result,
        Err(_) => Err(opswatch_lib::NotifyError::Timeout(timeout)),
    };

    match result {
        Ok(()) => {
            print_success("Alert delivered");
            Ok(())
        }
        Err(err) => {
            print_error(&format!("Delivery failed: {}", describe_notify_error(&err)));
            Err(err.into())
        }
    }
}
