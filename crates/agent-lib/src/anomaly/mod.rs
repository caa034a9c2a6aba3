//! Anomaly scoring for metric batches and log lines
//!
//! This module provides:
//! - An isolation forest fitted per call (no state survives between calls)
//! - Metric batch scoring with schema validation
//! - TF-IDF feature extraction for log lines, scored with the same forest

mod isolation_forest;
mod log_scorer;
mod scorer;
mod tfidf;

pub use isolation_forest::{
    average_path_length, percentile, FittedForest, IsolationForest, DEFAULT_MAX_SAMPLES,
    DEFAULT_TREES,
};
pub use log_scorer::LogAnomalyScorer;
pub use scorer::{feature_matrix, AnomalyScorer, ScoredBatch};
pub use tfidf::{tokenize, TfidfMatrix, TfidfVectorizer};

use crate::error::DetectionError;
use crate::models::{AnomalyLabel, MetricSample};

/// Label a metric batch with an entropy-seeded forest
pub fn score(
    batch: &[MetricSample],
    contamination: f64,
) -> Result<Vec<AnomalyLabel>, DetectionError> {
    AnomalyScorer::default().score(batch, contamination)
}

/// Label log records with an entropy-seeded forest
pub fn score_logs<S: AsRef<str>>(
    records: &[S],
    contamination: f64,
) -> Result<Vec<AnomalyLabel>, DetectionError> {
    LogAnomalyScorer::default().score_logs(records, contamination)
}
