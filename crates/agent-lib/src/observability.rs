//! Prometheus metrics and structured event logging for detection passes

use crate::error::NotifyError;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Latency buckets in seconds; a pass includes the notification round trip
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    pass_latency_seconds: Histogram,
    scoring_latency_seconds: Histogram,
    samples_scored: IntCounter,
    log_records_scored: IntCounter,
    anomalies_detected: IntCounterVec,
    notifications_sent: IntCounterVec,
    notifications_failed: IntCounterVec,
    pass_failures: IntCounterVec,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            pass_latency_seconds: register_histogram!(
                "opswatch_pass_latency_seconds",
                "Wall time of one collect, score, alert and notify pass",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register pass_latency_seconds"),

            scoring_latency_seconds: register_histogram!(
                "opswatch_scoring_latency_seconds",
                "Time spent fitting and scoring an isolation forest",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register scoring_latency_seconds"),

            samples_scored: register_int_counter!(
                "opswatch_samples_scored_total",
                "Metric samples passed through the anomaly scorer"
            )
            .expect("Failed to register samples_scored"),

            log_records_scored: register_int_counter!(
                "opswatch_log_records_scored_total",
                "Log records passed through the log anomaly scorer"
            )
            .expect("Failed to register log_records_scored"),

            anomalies_detected: register_int_counter_vec!(
                "opswatch_anomalies_detected_total",
                "Samples or records labelled anomalous",
                &["source"]
            )
            .expect("Failed to register anomalies_detected"),

            notifications_sent: register_int_counter_vec!(
                "opswatch_notifications_sent_total",
                "Alerts accepted by the notification channel",
                &["channel"]
            )
            .expect("Failed to register notifications_sent"),

            notifications_failed: register_int_counter_vec!(
                "opswatch_notifications_failed_total",
                "Alerts the notification channel failed to deliver",
                &["channel", "kind"]
            )
            .expect("Failed to register notifications_failed"),

            pass_failures: register_int_counter_vec!(
                "opswatch_pass_failures_total",
                "Passes aborted before reaching the alerting stage",
                &["stage"]
            )
            .expect("Failed to register pass_failures"),
        }
    }
}

/// Cheap handle to the process-wide metrics; clones share one registry
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    pub fn observe_pass_latency(&self, duration_secs: f64) {
        self.inner().pass_latency_seconds.observe(duration_secs);
    }

    pub fn observe_scoring_latency(&self, duration_secs: f64) {
        self.inner().scoring_latency_seconds.observe(duration_secs);
    }

    pub fn add_samples_scored(&self, count: usize) {
        self.inner().samples_scored.inc_by(count as u64);
    }

    pub fn add_log_records_scored(&self, count: usize) {
        self.inner().log_records_scored.inc_by(count as u64);
    }

    /// `source` is `metrics` or `logs`
    pub fn add_anomalies(&self, source: &str, count: usize) {
        self.inner()
            .anomalies_detected
            .with_label_values(&[source])
            .inc_by(count as u64);
    }

    pub fn inc_notifications_sent(&self, channel: &str) {
        self.inner()
            .notifications_sent
            .with_label_values(&[channel])
            .inc();
    }

    pub fn inc_notifications_failed(&self, channel: &str, err: &NotifyError) {
        self.inner()
            .notifications_failed
            .with_label_values(&[channel, err.kind()])
            .inc();
    }

    /// `stage` is `collection` or `detection`
    pub fn inc_pass_failures(&self, stage: &str) {
        self.inner().pass_failures.with_label_values(&[stage]).inc();
    }
}

/// Owns the event vocabulary of the JSON log stream
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn log_pass_completed(
        &self,
        samples: usize,
        anomalies: usize,
        alerts: usize,
        notified: bool,
        duration_ms: u128,
    ) {
        info!(
            event = "pass_completed",
            node = %self.node_name,
            samples = samples,
            anomalies = anomalies,
            alerts = alerts,
            notified = notified,
            duration_ms = duration_ms as u64,
            "Detection pass completed"
        );
    }

    /// One event per anomalous sample or log line
    pub fn log_anomaly(&self, source: &str, index: usize, score: f64, details: &str) {
        warn!(
            event = "anomaly_detected",
            node = %self.node_name,
            source = %source,
            index = index,
            score = score,
            details = %details,
            "Anomaly detected"
        );
    }

    pub fn log_notification_sent(&self, channel: &str, recipient: &str, subject: &str) {
        info!(
            event = "notification_sent",
            node = %self.node_name,
            channel = %channel,
            recipient = %recipient,
            subject = %subject,
            "Alert notification delivered"
        );
    }

    pub fn log_notification_failed(&self, channel: &str, recipient: &str, err: &NotifyError) {
        warn!(
            event = "notification_failed",
            node = %self.node_name,
            channel = %channel,
            recipient = %recipient,
            kind = err.kind(),
            error = %err,
            "Alert notification failed"
        );
    }

    pub fn log_startup(&self, version: &str, channel: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            channel = %channel,
            "opswatch agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "opswatch agent shutting down"
        );
    }
}
