//! Log line anomaly scoring
//!
//! Text is turned into TF-IDF rows and then labelled by the same
//! isolation-based scorer used for metrics.

use super::scorer::{AnomalyScorer, ScoredBatch};
use super::tfidf::TfidfVectorizer;
use crate::config::DetectionConfig;
use crate::error::DetectionError;
use crate::models::AnomalyLabel;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct LogAnomalyScorer {
    scorer: AnomalyScorer,
    vectorizer: TfidfVectorizer,
}

impl LogAnomalyScorer {
    pub fn new(random_seed: Option<u64>) -> Self {
        Self {
            scorer: AnomalyScorer::new(random_seed),
            vectorizer: TfidfVectorizer::new(),
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.random_seed)
    }

    /// Label each record, positionally aligned with `records`
    pub fn score_logs<S: AsRef<str>>(
        &self,
        records: &[S],
        contamination: f64,
    ) -> Result<Vec<AnomalyLabel>, DetectionError> {
        Ok(self.score_logs_detailed(records, contamination)?.labels)
    }

    pub fn score_logs_detailed<S: AsRef<str>>(
        &self,
        records: &[S],
        contamination: f64,
    ) -> Result<ScoredBatch, DetectionError> {
        if records.is_empty() {
            return Err(DetectionError::InvalidBatch(
                "log batch is empty".to_string(),
            ));
        }

        let matrix = self.vectorizer.fit_transform(records);
        debug!(
            records = records.len(),
            terms = matrix.n_terms(),
            "Extracted log features"
        );

        // An empty vocabulary leaves zero-width rows, which the scorer
        // treats as an undistinguishable batch.
        self.scorer.score_matrix(&matrix.rows, contamination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::count_anomalies;

    #[test]
    fn test_security_log_pair_returns_two_labels() {
        let logs = [
            "User login from IP 192.168.1.1",
            "Failed login attempt from IP 192.168.1.2",
        ];
        let labels = LogAnomalyScorer::new(Some(0)).score_logs(&logs, 0.1).unwrap();
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_distinctive_line_stands_out() {
        let mut logs: Vec<String> = (0..40)
            .map(|i| format!("GET /api/health status 200 latency {}ms", 10 + i % 3))
            .collect();
        logs.push("kernel segfault in worker process core dumped segfault segfault".to_string());

        let hits = (0..10u64)
            .filter(|&seed| {
                let labels = LogAnomalyScorer::new(Some(seed))
                    .score_logs(&logs, 0.05)
                    .unwrap();
                labels[40] == AnomalyLabel::Anomalous
            })
            .count();
        assert!(hits >= 9, "distinctive line flagged in only {hits}/10 runs");
    }

    #[test]
    fn test_blank_records_are_all_normal() {
        let logs = ["", "  ", "\t", ""];
        let labels = LogAnomalyScorer::default().score_logs(&logs, 0.1).unwrap();
        assert_eq!(labels.len(), 4);
        assert_eq!(count_anomalies(&labels), 0);
    }

    #[test]
    fn test_single_repeated_term_does_not_error() {
        let logs = ["timeout", "timeout timeout", "timeout"];
        let labels = LogAnomalyScorer::default().score_logs(&logs, 0.1).unwrap();
        assert_eq!(labels.len(), 3);
        // L2 normalisation makes every row identical
        assert_eq!(count_anomalies(&labels), 0);
    }

    #[test]
    fn test_empty_log_batch_is_rejected() {
        let logs: [&str; 0] = [];
        let err = LogAnomalyScorer::default().score_logs(&logs, 0.1).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidBatch(_)));
    }
}
