//! Agent configuration
//!
//! Read from an optional file named by `OPSWATCH_CONFIG` and then from
//! `OPSWATCH_*` environment variables, nested keys separated by `__`
//! (`OPSWATCH_DETECTION__CONTAMINATION=0.05`,
//! `OPSWATCH_SMTP__PASSWORD=...`).

use anyhow::{Context, Result};
use opswatch_lib::collector::SystemCollectorConfig;
use opswatch_lib::notifier::{NotifierSettings, SmtpConfig, WebhookConfig};
use opswatch_lib::DetectionConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "OPSWATCH";
const CONFIG_PATH_VAR: &str = "OPSWATCH_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Port for /healthz, /readyz and /metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between detection passes
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Address alerts are delivered to
    #[serde(default = "default_recipient")]
    pub recipient: String,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub collector: SystemCollectorConfig,

    #[serde(default)]
    pub smtp: Option<SmtpConfig>,

    #[serde(default)]
    pub webhook: Option<WebhookConfig>,

    /// Log file scored on every pass when set
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    #[serde(default = "default_log_max_lines")]
    pub log_max_lines: usize,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_interval() -> u64 {
    60
}

fn default_recipient() -> String {
    "root@localhost".to_string()
}

fn default_log_max_lines() -> usize {
    500
}

impl AgentConfig {
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read agent configuration")?;

        config
            .try_deserialize()
            .context("Invalid agent configuration")
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn notifier_settings(&self) -> NotifierSettings {
        NotifierSettings {
            smtp: self.smtp.clone(),
            webhook: self.webhook.clone(),
        }
    }
}
