//! Metric and log sources feeding the orchestrator
//!
//! The core does not care how measurements are acquired, only that a
//! source hands back a batch with a consistent schema. This module
//! provides the source traits plus host, file and in-memory
//! implementations.

mod log_file;
mod system;
mod window;


pub use log_file::FileLogSource;
pub use system::{disk_usage_percent, SystemCollector, SystemCollectorConfig};
pub use window::SampleWindow;

use crate::models::MetricSample;
use anyhow::Result;
use tokio::sync::Mutex;

pub use async_trait::async_trait;

/// Supplier of metric batches
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Return the batch to score on this pass
    async fn collect(&self) -> Result<Vec<MetricSample>>;
}

/// Supplier of log line batches
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn read_batch(&self) -> Result<Vec<String>>;
}

/// Source that hands out a fixed, pre-loaded batch
///
/// Used for offline scoring of exported samples.
pub struct StaticMetricSource {
    batch: Mutex<Vec<MetricSample>>,
}

impl StaticMetricSource {
    pub fn new(batch: Vec<MetricSample>) -> Self {
        Self {
            batch: Mutex::new(batch),
        }
    }

    /// Replace the batch returned by subsequent passes
    pub async fn replace(&self, batch: Vec<MetricSample>) {
        *self.batch.lock().await = batch;
    }
}

#[async_trait]
impl MetricSource for StaticMetricSource {
    async fn collect(&self) -> Result<Vec<MetricSample>> {
        Ok(self.batch.lock().await.clone())
    }
}
