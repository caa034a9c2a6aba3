//! Live host sampling

use anyhow::Result;
use opswatch_lib::{
    collector::{MetricSource, SystemCollector, SystemCollectorConfig},
    AlertGenerator, AnomalyScorer, DetectionConfig,
};
use std::path::PathBuf;
use std::time::Duration;

use super::score::render_samples;
use crate::output::{print_info, OutputFormat};

/// Take `count` samples `interval` apart and score them as one batch
pub async fn sample_host(
    count: usize,
    interval: Duration,
    disk_mount: PathBuf,
    config: &DetectionConfig,
    format: OutputFormat,
) -> Result<()> {
    let count = count.max(1);
    let collector = SystemCollector::new(SystemCollectorConfig {
        window_size: count,
        disk_mount,
    });

    if format == OutputFormat::Table {
        print_info(&format!(
            "Collecting {} samples every {}s",
            count,
            interval.as_secs_f64()
        ));
    }

    let mut batch = Vec::new();
    for taken in 0..count {
        if taken > 0 {
            tokio::time::sleep(interval).await;
        }
        batch = collector.collect().await?;
    }

    let scored = AnomalyScorer::from_config(config).score_detailed(&batch, config.contamination)?;
    let alerts = AlertGenerator::new(config.thresholds.clone()).predict(&batch, &scored.labels)?;

    render_samples(&batch, &scored, &alerts, format);
    Ok(())
}
