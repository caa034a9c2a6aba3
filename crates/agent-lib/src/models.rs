//! Core data models for the monitoring core

use serde::{Deserialize, Serialize};

/// Well-known field name for host CPU utilisation
pub const CPU_PERCENT: &str = "cpu_percent";
/// Well-known field name for host memory utilisation
pub const MEMORY_PERCENT: &str = "memory_percent";
/// Well-known field name for disk utilisation
pub const DISK_PERCENT: &str = "disk_percent";

/// A single named measurement inside a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricField {
    pub name: String,
    pub value: f64,
}

/// Snapshot of one or more numeric measurements at a point in time
///
/// Field order is significant: every sample in a batch must carry the
/// same names in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    pub fields: Vec<MetricField>,
}

impl MetricSample {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            fields: Vec::new(),
        }
    }

    /// Snapshot with the three host utilisation fields
    pub fn system(timestamp: i64, cpu: f64, memory: f64, disk: f64) -> Self {
        Self::new(timestamp)
            .with_field(CPU_PERCENT, cpu)
            .with_field(MEMORY_PERCENT, memory)
            .with_field(DISK_PERCENT, disk)
    }

    /// Append a field, keeping insertion order
    pub fn with_field(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fields.push(MetricField {
            name: name.into(),
            value,
        });
        self
    }

    /// Look up a field value by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value)
    }

    /// Field names in order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Numeric row used as model input
    pub fn values(&self) -> Vec<f64> {
        self.fields.iter().map(|f| f.value).collect()
    }
}

/// Outcome of scoring a single sample or log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyLabel {
    Normal,
    Anomalous,
}

impl AnomalyLabel {
    pub fn is_anomalous(&self) -> bool {
        matches!(self, AnomalyLabel::Anomalous)
    }

    /// Signed encoding: `1` for inliers, `-1` for outliers
    pub fn as_sign(&self) -> i8 {
        match self {
            AnomalyLabel::Normal => 1,
            AnomalyLabel::Anomalous => -1,
        }
    }
}

impl std::fmt::Display for AnomalyLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyLabel::Normal => write!(f, "normal"),
            AnomalyLabel::Anomalous => write!(f, "anomalous"),
        }
    }
}

/// Notification handed to a [`crate::notifier::Notifier`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

impl AlertMessage {
    pub fn new(
        subject: impl Into<String>,
        body: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            recipient: recipient.into(),
        }
    }
}

/// Count anomalous labels in a slice
pub fn count_anomalies(labels: &[AnomalyLabel]) -> usize {
    labels.iter().filter(|l| l.is_anomalous()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_sample_field_order() {
        let sample = MetricSample::system(10, 12.5, 40.0, 71.0);
        let names: Vec<_> = sample.field_names().collect();
        assert_eq!(names, vec![CPU_PERCENT, MEMORY_PERCENT, DISK_PERCENT]);
        assert_eq!(sample.values(), vec![12.5, 40.0, 71.0]);
        assert_eq!(sample.get(MEMORY_PERCENT), Some(40.0));
        assert_eq!(sample.get("gpu_percent"), None);
    }

    #[test]
    fn test_label_encoding() {
        assert_eq!(AnomalyLabel::Normal.as_sign(), 1);
        assert_eq!(AnomalyLabel::Anomalous.as_sign(), -1);
        assert_eq!(
            serde_json::to_string(&AnomalyLabel::Anomalous).unwrap(),
            "\"anomalous\""
        );
        assert_eq!(
            count_anomalies(&[
                AnomalyLabel::Normal,
                AnomalyLabel::Anomalous,
                AnomalyLabel::Anomalous
            ]),
            2
        );
    }
}
