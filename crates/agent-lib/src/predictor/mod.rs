//! Predictive alert generation
//!
//! A policy layer over the scorer output: it maps the current labels and a
//! few threshold/trend heuristics onto one short statement per sample. It
//! never looks at the model, so the policy can change without touching
//! detection.

mod trend;

pub use trend::{linear_regression_slope, project, trailing_run, MIN_TREND_POINTS};

use crate::config::AlertThresholds;
use crate::error::DetectionError;
use crate::models::{AnomalyLabel, MetricSample, CPU_PERCENT, DISK_PERCENT, MEMORY_PERCENT};

/// Utilisation ceiling a trend is projected against
const EXHAUSTION_PERCENT: f64 = 100.0;

/// Derive one alert string per sample; see [`AlertGenerator::predict`]
pub fn predict(
    batch: &[MetricSample],
    labels: &[AnomalyLabel],
    thresholds: &AlertThresholds,
) -> Result<Vec<String>, DetectionError> {
    AlertGenerator::new(thresholds.clone()).predict(batch, labels)
}

/// Maps anomaly labels and utilisation heuristics to alert text
#[derive(Debug, Clone, Default)]
pub struct AlertGenerator {
    thresholds: AlertThresholds,
}

impl AlertGenerator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Text used for samples that need no attention
    pub fn no_alert_text(&self) -> &str {
        &self.thresholds.no_alert_text
    }

    /// True when `alert` is anything other than the no-alert sentinel
    pub fn is_alert(&self, alert: &str) -> bool {
        alert != self.thresholds.no_alert_text
    }

    /// One alert per sample, same order and length as `batch`
    pub fn predict(
        &self,
        batch: &[MetricSample],
        labels: &[AnomalyLabel],
    ) -> Result<Vec<String>, DetectionError> {
        if labels.len() != batch.len() {
            return Err(DetectionError::InvalidInput(format!(
                "{} labels for {} samples",
                labels.len(),
                batch.len()
            )));
        }

        Ok(labels
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                let statements = self.statements(batch, idx, *label);
                if statements.is_empty() {
                    self.thresholds.no_alert_text.clone()
                } else {
                    statements.join("; ")
                }
            })
            .collect())
    }

    fn statements(&self, batch: &[MetricSample], idx: usize, label: AnomalyLabel) -> Vec<String> {
        let mut statements = Vec::new();
        let history = &batch[..=idx];

        for field in &batch[idx].fields {
            let Some((resource, threshold)) = self.watched(&field.name) else {
                continue;
            };
            let series: Vec<f64> = history.iter().filter_map(|s| s.get(&field.name)).collect();

            let run = trailing_run(&series, |v| v >= threshold);
            if run >= self.thresholds.sustained_samples.max(2) {
                statements.push(format!(
                    "{resource} usage above {threshold}% for {run} consecutive samples"
                ));
            } else if field.value >= threshold {
                statements.push(format!(
                    "{resource} usage at {:.1}% exceeds {threshold}% warning threshold",
                    field.value
                ));
            }

            let window = self.thresholds.trend_window.max(MIN_TREND_POINTS);
            let recent = &series[series.len().saturating_sub(window)..];
            if linear_regression_slope(recent) > 0.0 {
                if let Some(projected) = project(recent, self.thresholds.trend_horizon) {
                    if projected >= EXHAUSTION_PERCENT {
                        statements.push(format!("{resource} usage trending toward exhaustion"));
                    }
                }
            }
        }

        if label.is_anomalous() {
            statements.push("Anomalous resource pattern detected".to_string());
        }
        statements
    }

    fn watched(&self, field: &str) -> Option<(&'static str, f64)> {
        match field {
            CPU_PERCENT => Some(("CPU", self.thresholds.cpu_warn_threshold)),
            MEMORY_PERCENT => Some(("Memory", self.thresholds.memory_warn_threshold)),
            DISK_PERCENT => Some(("Disk", self.thresholds.disk_warn_threshold)),
            _ => None,
        }
    }
}
