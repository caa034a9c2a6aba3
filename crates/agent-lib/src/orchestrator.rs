//! One detection pass: collect, score, derive alerts, maybe notify
//!
//! A pass always leaves the orchestrator in [`PassState::Idle`]. Failures
//! before alerting abort the pass with a [`PassError`]; a failed
//! notification is recorded in the report and never aborts it.

use crate::anomaly::{AnomalyScorer, LogAnomalyScorer};
use crate::collector::MetricSource;
use crate::config::DetectionConfig;
use crate::error::{NotifyError, PassError};
use crate::health::{components, HealthRegistry};
use crate::models::{count_anomalies, AlertMessage, AnomalyLabel, MetricSample};
use crate::notifier::Notifier;
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::predictor::AlertGenerator;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Subject prefix for every alert message
pub const ALERT_SUBJECT: &str = "AIOps Alert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassState {
    Idle,
    Collecting,
    Scoring,
    Alerting,
    Notifying,
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassState::Idle => "idle",
            PassState::Collecting => "collecting",
            PassState::Scoring => "scoring",
            PassState::Alerting => "alerting",
            PassState::Notifying => "notifying",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// The trigger did not fire
    NotAttempted,
    Delivered,
    Failed(NotifyError),
}

impl NotificationOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, NotificationOutcome::Delivered)
    }
}

/// Result of a completed metric pass
#[derive(Debug, Clone)]
pub struct PassReport {
    /// Every state entered, in order, ending with `Idle`
    pub states: Vec<PassState>,
    pub samples: usize,
    pub labels: Vec<AnomalyLabel>,
    pub scores: Vec<f64>,
    pub alerts: Vec<String>,
    pub notification: NotificationOutcome,
    pub duration: Duration,
}

impl PassReport {
    pub fn anomaly_count(&self) -> usize {
        count_anomalies(&self.labels)
    }
}

/// Result of scoring one batch of log records
#[derive(Debug, Clone)]
pub struct LogPassReport {
    pub labels: Vec<AnomalyLabel>,
    /// `(index, line)` of every record labelled anomalous
    pub anomalous: Vec<(usize, String)>,
}

/// What the stages before `Idle` produced
struct Stages {
    samples: usize,
    labels: Vec<AnomalyLabel>,
    scores: Vec<f64>,
    alerts: Vec<String>,
    notification: NotificationOutcome,
}

pub struct Orchestrator {
    config: DetectionConfig,
    source: Arc<dyn MetricSource>,
    notifier: Arc<dyn Notifier>,
    recipient: String,
    generator: AlertGenerator,
    health: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
    state: RwLock<PassState>,
}

impl Orchestrator {
    pub fn new(
        config: DetectionConfig,
        source: Arc<dyn MetricSource>,
        notifier: Arc<dyn Notifier>,
        recipient: impl Into<String>,
    ) -> Self {
        let generator = AlertGenerator::new(config.thresholds.clone());
        Self {
            config,
            source,
            notifier,
            recipient: recipient.into(),
            generator,
            health: HealthRegistry::new(),
            metrics: AgentMetrics::new(),
            logger: StructuredLogger::new("local"),
            state: RwLock::new(PassState::Idle),
        }
    }

    /// Report into a shared registry instead of a private one
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn channel(&self) -> &'static str {
        self.notifier.channel()
    }

    pub async fn state(&self) -> PassState {
        *self.state.read().await
    }

    /// Fires when any sample is anomalous or carries a real alert
    pub fn default_trigger(&self, labels: &[AnomalyLabel], alerts: &[String]) -> bool {
        labels.iter().any(AnomalyLabel::is_anomalous)
            || alerts.iter().any(|a| self.generator.is_alert(a))
    }

    /// Run a pass with [`Self::default_trigger`]
    pub async fn run_default_pass(&self) -> Result<PassReport, PassError> {
        self.run_pass(|labels: &[AnomalyLabel], alerts: &[String]| {
            self.default_trigger(labels, alerts)
        })
        .await
    }

    /// Run one pass; `trigger` decides whether the result is worth a
    /// notification
    pub async fn run_pass<F>(&self, trigger: F) -> Result<PassReport, PassError>
    where
        F: Fn(&[AnomalyLabel], &[String]) -> bool,
    {
        let started = Instant::now();
        let mut states = Vec::with_capacity(5);

        let result = self.execute(&trigger, &mut states).await;
        self.enter(&mut states, PassState::Idle).await;

        match result {
            Ok(stages) => {
                let duration = started.elapsed();
                self.metrics.observe_pass_latency(duration.as_secs_f64());
                let report = PassReport {
                    states,
                    samples: stages.samples,
                    labels: stages.labels,
                    scores: stages.scores,
                    alerts: stages.alerts,
                    notification: stages.notification,
                    duration,
                };
                self.logger.log_pass_completed(
                    report.samples,
                    report.anomaly_count(),
                    report
                        .alerts
                        .iter()
                        .filter(|a| self.generator.is_alert(a))
                        .count(),
                    report.notification.is_delivered(),
                    duration.as_millis(),
                );
                Ok(report)
            }
            Err(err) => {
                let stage = match err {
                    PassError::Collection(_) => "collection",
                    PassError::Detection(_) => "detection",
                };
                self.metrics.inc_pass_failures(stage);
                Err(err)
            }
        }
    }

    async fn execute<F>(
        &self,
        trigger: &F,
        states: &mut Vec<PassState>,
    ) -> Result<Stages, PassError>
    where
        F: Fn(&[AnomalyLabel], &[String]) -> bool,
    {
        self.enter(states, PassState::Collecting).await;
        let batch = match self.source.collect().await {
            Ok(batch) => {
                self.health.set_healthy(components::COLLECTOR).await;
                batch
            }
            Err(e) => {
                self.health
                    .set_unhealthy(components::COLLECTOR, format!("{:#}", e))
                    .await;
                return Err(PassError::Collection(e));
            }
        };

        self.enter(states, PassState::Scoring).await;
        let scoring_started = Instant::now();
        let scored = match AnomalyScorer::from_config(&self.config)
            .score_detailed(&batch, self.config.contamination)
        {
            Ok(scored) => scored,
            Err(e) => {
                self.health
                    .set_degraded(components::SCORER, e.to_string())
                    .await;
                return Err(e.into());
            }
        };
        self.metrics
            .observe_scoring_latency(scoring_started.elapsed().as_secs_f64());
        self.metrics.add_samples_scored(batch.len());

        self.enter(states, PassState::Alerting).await;
        let alerts = match self.generator.predict(&batch, &scored.labels) {
            Ok(alerts) => alerts,
            Err(e) => {
                self.health
                    .set_degraded(components::SCORER, e.to_string())
                    .await;
                return Err(e.into());
            }
        };
        self.health.set_healthy(components::SCORER).await;

        let anomalies = count_anomalies(&scored.labels);
        self.metrics.add_anomalies("metrics", anomalies);
        for (idx, label) in scored.labels.iter().enumerate() {
            if label.is_anomalous() {
                self.logger
                    .log_anomaly("metrics", idx, scored.scores[idx], &alerts[idx]);
            }
        }

        let notification = if trigger(&scored.labels, &alerts) {
            self.enter(states, PassState::Notifying).await;
            let message = self.render(&batch, &scored.labels, &alerts);
            self.deliver(&message).await
        } else {
            debug!("Trigger did not fire, skipping notification");
            NotificationOutcome::NotAttempted
        };

        Ok(Stages {
            samples: batch.len(),
            labels: scored.labels,
            scores: scored.scores,
            alerts,
            notification,
        })
    }

    /// Score a batch of log records and report the anomalous lines
    pub async fn run_log_pass<S: AsRef<str>>(
        &self,
        records: &[S],
    ) -> Result<LogPassReport, PassError> {
        let scorer = LogAnomalyScorer::from_config(&self.config);
        let scored = match scorer.score_logs_detailed(records, self.config.contamination) {
            Ok(scored) => scored,
            Err(e) => {
                self.metrics.inc_pass_failures("detection");
                return Err(e.into());
            }
        };
        self.metrics.add_log_records_scored(records.len());

        let anomalous: Vec<(usize, String)> = scored
            .labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.is_anomalous())
            .map(|(idx, _)| (idx, records[idx].as_ref().to_string()))
            .collect();

        self.metrics.add_anomalies("logs", anomalous.len());
        for (idx, line) in &anomalous {
            self.logger.log_anomaly("logs", *idx, scored.scores[*idx], line);
        }
        info!(
            records = records.len(),
            anomalies = anomalous.len(),
            "Log pass completed"
        );

        Ok(LogPassReport {
            labels: scored.labels,
            anomalous,
        })
    }

    /// Build the alert message for a pass that triggered
    pub fn render(
        &self,
        batch: &[MetricSample],
        labels: &[AnomalyLabel],
        alerts: &[String],
    ) -> AlertMessage {
        let anomalies = count_anomalies(labels);
        let warnings = alerts.iter().filter(|a| self.generator.is_alert(a)).count();
        let subject = format!(
            "{}: {} anomalous of {} samples, {} warnings",
            ALERT_SUBJECT,
            anomalies,
            batch.len(),
            warnings
        );

        let rows: Vec<String> = batch
            .iter()
            .zip(labels)
            .zip(alerts)
            .filter(|((_, label), alert)| {
                label.is_anomalous() || self.generator.is_alert(alert.as_str())
            })
            .map(|((sample, label), alert)| {
                let at = chrono::DateTime::from_timestamp(sample.timestamp, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| sample.timestamp.to_string());
                format!("{} [{}] {}\n", at, label, alert)
            })
            .collect();

        let mut body = format!(
            "Node {} flagged {} of {} samples.\n",
            self.logger.node_name(),
            rows.len(),
            batch.len()
        );
        body.extend(rows);

        AlertMessage::new(subject, body, self.recipient.clone())
    }

    /// One delivery attempt, bounded by the configured timeout
    async fn deliver(&self, message: &AlertMessage) -> NotificationOutcome {
        let channel = self.notifier.channel();
        let timeout = self.config.notify_timeout();

        let result = match tokio::time::timeout(timeout, self.notifier.notify(message)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(timeout)),
        };

        match result {
            Ok(()) => {
                self.metrics.inc_notifications_sent(channel);
                self.logger
                    .log_notification_sent(channel, &message.recipient, &message.subject);
                self.health.set_healthy(components::NOTIFIER).await;
                NotificationOutcome::Delivered
            }
            Err(err) => {
                self.metrics.inc_notifications_failed(channel, &err);
                self.logger
                    .log_notification_failed(channel, &message.recipient, &err);
                self.health
                    .set_degraded(components::NOTIFIER, format!("{}: {}", err.kind(), err))
                    .await;
                NotificationOutcome::Failed(err)
            }
        }
    }

    async fn enter(&self, states: &mut Vec<PassState>, next: PassState) {
        debug!(state = %next, "Pass state transition");
        *self.state.write().await = next;
        states.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::StaticMetricSource;
    use crate::error::DetectionError;
    use crate::health::ComponentStatus;
    use crate::notifier::LogNotifier;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    struct RejectingNotifier;

    #[async_trait]
    impl Notifier for RejectingNotifier {
        async fn notify(&self, _message: &AlertMessage) -> Result<(), NotifyError> {
            Err(NotifyError::AuthFailure("535 5.7.8 bad credentials".into()))
        }

        fn channel(&self) -> &'static str {
            "rejecting"
        }
    }

    struct SlowNotifier;

    #[async_trait]
    impl Notifier for SlowNotifier {
        async fn notify(&self, _message: &AlertMessage) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        fn channel(&self) -> &'static str {
            "slow"
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, _message: &AlertMessage) -> Result<(), NotifyError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn channel(&self) -> &'static str {
            "counting"
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MetricSource for FailingSource {
        async fn collect(&self) -> anyhow::Result<Vec<MetricSample>> {
            Err(anyhow!("sysinfo unavailable"))
        }
    }

    /// Twenty quiet samples plus one saturated host
    fn batch_with_outlier() -> Vec<MetricSample> {
        let mut batch: Vec<MetricSample> = (0..20)
            .map(|i| {
                let jitter = (i % 4) as f64 * 0.5;
                MetricSample::system(1_700_000_000 + i, 20.0 + jitter, 40.0 + jitter, 50.0)
            })
            .collect();
        batch.push(MetricSample::system(1_700_000_020, 99.0, 97.0, 95.0));
        batch
    }

    fn quiet_batch() -> Vec<MetricSample> {
        (0..10)
            .map(|i| MetricSample::system(1_700_000_000 + i, 20.0, 40.0, 50.0))
            .collect()
    }

    fn orchestrator(batch: Vec<MetricSample>, notifier: Arc<dyn Notifier>) -> Orchestrator {
        Orchestrator::new(
            DetectionConfig::default().with_seed(7),
            Arc::new(StaticMetricSource::new(batch)),
            notifier,
            "oncall@example.com",
        )
    }

    #[tokio::test]
    async fn test_pass_visits_every_state() {
        let counting = Arc::new(CountingNotifier::default());
        let orch = orchestrator(batch_with_outlier(), counting.clone());

        let report = orch.run_default_pass().await.unwrap();

        assert_eq!(
            report.states,
            vec![
                PassState::Collecting,
                PassState::Scoring,
                PassState::Alerting,
                PassState::Notifying,
                PassState::Idle,
            ]
        );
        assert_eq!(report.labels.len(), 21);
        assert_eq!(report.alerts.len(), 21);
        assert_eq!(report.notification, NotificationOutcome::Delivered);
        assert_eq!(counting.sent.load(Ordering::SeqCst), 1);
        assert_eq!(orch.state().await, PassState::Idle);
    }

    #[tokio::test]
    async fn test_auth_failure_still_reaches_idle() {
        let orch = orchestrator(batch_with_outlier(), Arc::new(RejectingNotifier));

        let report = orch.run_pass(|_: &[AnomalyLabel], _: &[String]| true).await.unwrap();

        assert!(matches!(
            report.notification,
            NotificationOutcome::Failed(NotifyError::AuthFailure(_))
        ));
        assert_eq!(report.states.last(), Some(&PassState::Idle));
        assert_eq!(orch.state().await, PassState::Idle);

        let notifier = orch.health().component(components::NOTIFIER).await.unwrap();
        assert_eq!(notifier.status, ComponentStatus::Degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_notifier_times_out() {
        let mut config = DetectionConfig::default().with_seed(7);
        config.notify_timeout_seconds = 1;
        let orch = Orchestrator::new(
            config,
            Arc::new(StaticMetricSource::new(batch_with_outlier())),
            Arc::new(SlowNotifier),
            "oncall@example.com",
        );

        let report = orch.run_pass(|_: &[AnomalyLabel], _: &[String]| true).await.unwrap();

        assert_eq!(
            report.notification,
            NotificationOutcome::Failed(NotifyError::Timeout(Duration::from_secs(1)))
        );
        assert_eq!(orch.state().await, PassState::Idle);
    }

    #[tokio::test]
    async fn test_trigger_declines_notification() {
        let counting = Arc::new(CountingNotifier::default());
        let orch = orchestrator(batch_with_outlier(), counting.clone());

        let report = orch.run_pass(|_: &[AnomalyLabel], _: &[String]| false).await.unwrap();

        assert_eq!(report.notification, NotificationOutcome::NotAttempted);
        assert!(!report.states.contains(&PassState::Notifying));
        assert_eq!(counting.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_quiet_batch_does_not_notify_by_default() {
        let counting = Arc::new(CountingNotifier::default());
        let orch = orchestrator(quiet_batch(), counting.clone());

        let report = assert_ok!(orch.run_default_pass().await);

        assert_eq!(report.anomaly_count(), 0);
        assert!(report.alerts.iter().all(|a| a == "No alerts"));
        assert_eq!(report.notification, NotificationOutcome::NotAttempted);
    }

    #[tokio::test]
    async fn test_empty_batch_aborts_with_invalid_batch() {
        let orch = orchestrator(Vec::new(), Arc::new(LogNotifier::new()));

        let err = orch.run_default_pass().await.unwrap_err();

        assert!(matches!(
            err,
            PassError::Detection(DetectionError::InvalidBatch(_))
        ));
        assert_eq!(orch.state().await, PassState::Idle);
    }

    #[tokio::test]
    async fn test_collection_failure_marks_collector_unhealthy() {
        let orch = Orchestrator::new(
            DetectionConfig::default(),
            Arc::new(FailingSource),
            Arc::new(LogNotifier::new()),
            "oncall@example.com",
        );

        let err = orch.run_default_pass().await.unwrap_err();
        assert!(matches!(err, PassError::Collection(_)));

        let collector = orch.health().component(components::COLLECTOR).await.unwrap();
        assert_eq!(collector.status, ComponentStatus::Unhealthy);
        assert_eq!(orch.state().await, PassState::Idle);
    }

    #[tokio::test]
    async fn test_log_pass_reports_anomalous_lines() {
        let orch = orchestrator(quiet_batch(), Arc::new(LogNotifier::new()));
        let mut records: Vec<String> = (0..12)
            .map(|i| format!("User login from IP 192.168.1.{}", i % 3))
            .collect();
        records.push("kernel panic segfault in module xfs at address deadbeef".to_string());

        let report = orch.run_log_pass(&records).await.unwrap();

        assert_eq!(report.labels.len(), records.len());
        assert!(report
            .anomalous
            .iter()
            .all(|(idx, line)| &records[*idx] == line));
    }

    #[tokio::test]
    async fn test_log_pass_rejects_empty_batch() {
        let orch = orchestrator(quiet_batch(), Arc::new(LogNotifier::new()));
        let records: Vec<String> = Vec::new();

        let err = assert_err!(orch.run_log_pass(&records).await);
        assert!(matches!(
            err,
            PassError::Detection(DetectionError::InvalidBatch(_))
        ));
    }

    #[test]
    fn test_render_lists_flagged_samples() {
        let orch = orchestrator(Vec::new(), Arc::new(LogNotifier::new()));
        let batch = vec![
            MetricSample::system(0, 10.0, 10.0, 10.0),
            MetricSample::system(60, 95.0, 10.0, 10.0),
        ];
        let labels = vec![AnomalyLabel::Normal, AnomalyLabel::Anomalous];
        let alerts = vec![
            "No alerts".to_string(),
            "CPU usage at 95.0% exceeds 90% warning threshold".to_string(),
        ];

        let message = orch.render(&batch, &labels, &alerts);

        assert!(message.subject.starts_with(ALERT_SUBJECT));
        assert!(message.subject.contains("1 anomalous of 2 samples"));
        assert!(message.body.contains("1970-01-01T00:01:00+00:00 [anomalous] CPU usage"));
        assert!(message.body.contains("flagged 1 of 2 samples"));
        assert!(!message.body.contains("No alerts"));
        assert_eq!(message.recipient, "oncall@example.com");
    }

    #[test]
    fn test_render_counts_every_listed_row() {
        let orch = orchestrator(Vec::new(), Arc::new(LogNotifier::new()));
        let batch = vec![
            MetricSample::system(0, 10.0, 10.0, 10.0),
            MetricSample::system(60, 95.0, 10.0, 10.0),
            MetricSample::system(120, 12.0, 10.0, 10.0),
        ];
        // Anomalous row without a warning, warning row without an anomaly
        let labels = vec![
            AnomalyLabel::Anomalous,
            AnomalyLabel::Normal,
            AnomalyLabel::Normal,
        ];
        let alerts = vec![
            "No alerts".to_string(),
            "CPU usage at 95.0% exceeds 90% warning threshold".to_string(),
            "No alerts".to_string(),
        ];

        let message = orch.render(&batch, &labels, &alerts);

        assert!(message.body.contains("flagged 2 of 3 samples"), "{}", message.body);
        assert_eq!(message.body.lines().count(), 3);
    }
}
