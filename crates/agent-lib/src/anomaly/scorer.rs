//! Batch anomaly scoring for metric samples
//!
//! Every call fits a fresh isolation forest on the batch it is asked to
//! label and throws it away afterwards.

use super::isolation_forest::{percentile, IsolationForest, DEFAULT_TREES};
use crate::config::DetectionConfig;
use crate::error::DetectionError;
use crate::models::{AnomalyLabel, MetricSample};
use serde::Serialize;
use tracing::debug;

/// Labels plus the raw scores they were derived from
#[derive(Debug, Clone, Serialize)]
pub struct ScoredBatch {
    pub labels: Vec<AnomalyLabel>,
    /// Isolation score per row, higher is more anomalous
    pub scores: Vec<f64>,
    /// Rows scoring strictly above this are anomalous
    pub threshold: f64,
}

impl ScoredBatch {
    fn all_normal(rows: usize) -> Self {
        Self {
            labels: vec![AnomalyLabel::Normal; rows],
            scores: vec![0.0; rows],
            threshold: 0.0,
        }
    }
}

/// Unsupervised scorer over fixed-width numeric rows
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    random_seed: Option<u64>,
    n_trees: usize,
}

impl Default for AnomalyScorer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AnomalyScorer {
    pub fn new(random_seed: Option<u64>) -> Self {
        Self {
            random_seed,
            n_trees: DEFAULT_TREES,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.random_seed)
    }

    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees.max(1);
        self
    }

    /// Label each sample of `batch`, positionally aligned
    pub fn score(
        &self,
        batch: &[MetricSample],
        contamination: f64,
    ) -> Result<Vec<AnomalyLabel>, DetectionError> {
        Ok(self.score_detailed(batch, contamination)?.labels)
    }

    pub fn score_detailed(
        &self,
        batch: &[MetricSample],
        contamination: f64,
    ) -> Result<ScoredBatch, DetectionError> {
        let matrix = feature_matrix(batch)?;
        self.score_matrix(&matrix, contamination)
    }

    /// Score an arbitrary feature matrix (one row per observation)
    pub fn score_matrix(
        &self,
        matrix: &[Vec<f64>],
        contamination: f64,
    ) -> Result<ScoredBatch, DetectionError> {
        validate_contamination(contamination)?;
        if matrix.is_empty() {
            return Err(DetectionError::InvalidBatch("batch is empty".to_string()));
        }

        // Nothing to isolate: a single row, or every row identical
        if matrix.len() < 2 || matrix.iter().all(|row| row == &matrix[0]) {
            debug!(rows = matrix.len(), "Degenerate batch, labelling all rows normal");
            return Ok(ScoredBatch::all_normal(matrix.len()));
        }

        let forest = IsolationForest::new(self.random_seed)
            .with_trees(self.n_trees)
            .fit(matrix);
        let scores = forest.score_all(matrix);
        let threshold = percentile(&scores, 1.0 - contamination);

        let labels = scores
            .iter()
            .map(|&s| {
                if s > threshold {
                    AnomalyLabel::Anomalous
                } else {
                    AnomalyLabel::Normal
                }
            })
            .collect();

        Ok(ScoredBatch {
            labels,
            scores,
            threshold,
        })
    }
}

fn validate_contamination(contamination: f64) -> Result<(), DetectionError> {
    if contamination > 0.0 && contamination < 1.0 {
        Ok(())
    } else {
        Err(DetectionError::InvalidBatch(format!(
            "contamination must be in (0, 1), got {contamination}"
        )))
    }
}

/// Build the numeric matrix for a batch, enforcing a shared schema
pub fn feature_matrix(batch: &[MetricSample]) -> Result<Vec<Vec<f64>>, DetectionError> {
    let first = batch
        .first()
        .ok_or_else(|| DetectionError::InvalidBatch("batch is empty".to_string()))?;
    if first.fields.is_empty() {
        return Err(DetectionError::InvalidBatch(
            "samples carry no fields".to_string(),
        ));
    }
    let schema: Vec<&str> = first.field_names().collect();

    batch
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            if !sample.field_names().eq(schema.iter().copied()) {
                return Err(DetectionError::InvalidBatch(format!(
                    "sample {i} has fields {:?}, expected {:?}",
                    sample.field_names().collect::<Vec<_>>(),
                    schema
                )));
            }
            if let Some(field) = sample.fields.iter().find(|f| !f.value.is_finite()) {
                return Err(DetectionError::InvalidBatch(format!(
                    "sample {i} field {} is not a finite number",
                    field.name
                )));
            }
            Ok(sample.values())
        })
        .collect()
}
