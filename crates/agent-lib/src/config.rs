//! Detection and alerting configuration
//!
//! These structs are consumed, not loaded, by the core. Binaries build
//! them from files or the environment; absent values take the defaults
//! below.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default expected fraction of anomalous samples
pub const DEFAULT_CONTAMINATION: f64 = 0.1;

/// Default warning threshold for utilisation fields (percent)
pub const DEFAULT_WARN_THRESHOLD: f64 = 90.0;

/// Default sentinel emitted when a sample warrants no alert
pub const NO_ALERT: &str = "No alerts";

/// Scoring, alerting and notification settings for one orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Expected fraction of outliers, in (0, 1)
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    /// Seed for reproducible labels; entropy-seeded when unset
    #[serde(default)]
    pub random_seed: Option<u64>,

    #[serde(default)]
    pub thresholds: AlertThresholds,

    /// Upper bound on a single notification attempt
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_seconds: u64,
}

fn default_contamination() -> f64 {
    DEFAULT_CONTAMINATION
}

fn default_notify_timeout() -> u64 {
    10
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            contamination: default_contamination(),
            random_seed: None,
            thresholds: AlertThresholds::default(),
            notify_timeout_seconds: default_notify_timeout(),
        }
    }
}

impl DetectionConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_seconds)
    }
}

/// Policy knobs for the predictive alert generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    #[serde(default = "default_warn_threshold")]
    pub cpu_warn_threshold: f64,

    #[serde(default = "default_warn_threshold")]
    pub memory_warn_threshold: f64,

    #[serde(default = "default_warn_threshold")]
    pub disk_warn_threshold: f64,

    /// Consecutive samples over threshold before reporting sustained pressure
    #[serde(default = "default_sustained_samples")]
    pub sustained_samples: usize,

    /// Trailing samples used to fit the usage trend
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    /// Samples ahead the trend is projected
    #[serde(default = "default_trend_horizon")]
    pub trend_horizon: usize,

    #[serde(default = "default_no_alert_text")]
    pub no_alert_text: String,
}

fn default_warn_threshold() -> f64 {
    DEFAULT_WARN_THRESHOLD
}

fn default_sustained_samples() -> usize {
    3
}

fn default_trend_window() -> usize {
    5
}

fn default_trend_horizon() -> usize {
    10
}

fn default_no_alert_text() -> String {
    NO_ALERT.to_string()
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu_warn_threshold: default_warn_threshold(),
            memory_warn_threshold: default_warn_threshold(),
            disk_warn_threshold: default_warn_threshold(),
            sustained_samples: default_sustained_samples(),
            trend_window: default_trend_window(),
            trend_horizon: default_trend_horizon(),
            no_alert_text: default_no_alert_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.contamination, 0.1);
        assert_eq!(config.random_seed, None);
        assert_eq!(config.notify_timeout(), Duration::from_secs(10));
        assert_eq!(config.thresholds.cpu_warn_threshold, 90.0);
        assert_eq!(config.thresholds.no_alert_text, "No alerts");
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: DetectionConfig = serde_json::from_str(
            r#"{"random_seed": 7, "thresholds": {"disk_warn_threshold": 80.0}}"#,
        )
        .unwrap();

        assert_eq!(config.random_seed, Some(7));
        assert_eq!(config.contamination, 0.1);
        assert_eq!(config.thresholds.disk_warn_threshold, 80.0);
        assert_eq!(config.thresholds.cpu_warn_threshold, 90.0);
        assert_eq!(config.thresholds.sustained_samples, 3);
    }
}
