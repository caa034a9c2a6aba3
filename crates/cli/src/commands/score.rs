//! Offline scoring of metric and log files

use anyhow::{Context, Result};
use opswatch_lib::{
    collector::FileLogSource, AlertGenerator, AnomalyScorer, DetectionConfig, LogAnomalyScorer,
    MetricSample, ScoredBatch,
};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_label, color_score, print_info, print_table, print_warning, truncate, OutputFormat,
};

#[derive(Tabled, Serialize)]
struct SampleRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Values")]
    values: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Alert")]
    alert: String,
}

#[derive(Tabled, Serialize)]
struct LogRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Record")]
    record: String,
}

/// Parse a JSON array of samples
///
/// Accepts either the native `{timestamp, fields: [{name, value}]}` shape
/// or flat objects such as `{"timestamp": 1, "cpu_percent": 12.5}`. A
/// non-numeric value becomes NaN so the scorer rejects the batch.
pub fn parse_samples(content: &str) -> Result<Vec<MetricSample>> {
    if let Ok(samples) = serde_json::from_str::<Vec<MetricSample>>(content) {
        return Ok(samples);
    }

    let rows: Vec<serde_json::Map<String, Value>> =
        serde_json::from_str(content).context("Expected a JSON array of metric samples")?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let timestamp = row
                .get("timestamp")
                .and_then(Value::as_i64)
                .unwrap_or(idx as i64);
            row.iter()
                .filter(|(name, _)| name.as_str() != "timestamp")
                .fold(MetricSample::new(timestamp), |sample, (name, value)| {
                    sample.with_field(name.as_str(), value.as_f64().unwrap_or(f64::NAN))
                })
        })
        .collect())
}

fn format_time(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Print one row per sample with its label, score and alert
pub fn render_samples(
    batch: &[MetricSample],
    scored: &ScoredBatch,
    alerts: &[String],
    format: OutputFormat,
) {
    let rows: Vec<SampleRow> = batch
        .iter()
        .enumerate()
        .map(|(idx, sample)| SampleRow {
            index: idx,
            time: format_time(sample.timestamp),
            values: sample
                .fields
                .iter()
                .map(|f| format!("{}={:.1}", f.name, f.value))
                .collect::<Vec<_>>()
                .join(" "),
            label: match format {
                OutputFormat::Table => color_label(scored.labels[idx]),
                OutputFormat::Json => scored.labels[idx].to_string(),
            },
            score: match format {
                OutputFormat::Table => color_score(scored.scores[idx], scored.threshold),
                OutputFormat::Json => format!("{:.4}", scored.scores[idx]),
            },
            alert: alerts[idx].clone(),
        })
        .collect();

    print_table(&rows, format);
}

pub fn score_metrics(path: &Path, config: &DetectionConfig, format: OutputFormat) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read metrics file {:?}", path))?;
    let batch = parse_samples(&content)?;

    let scored = AnomalyScorer::from_config(config).score_detailed(&batch, config.contamination)?;
    let alerts = AlertGenerator::new(config.thresholds.clone()).predict(&batch, &scored.labels)?;

    render_samples(&batch, &scored, &alerts, format);
    if format == OutputFormat::Table {
        summarize(scored.labels.iter().filter(|l| l.is_anomalous()).count(), batch.len());
    }
    Ok(())
}

pub fn score_logs(
    path: &Path,
    max_lines: usize,
    config: &DetectionConfig,
    format: OutputFormat,
) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read log file {:?}", path))?;
    let records = FileLogSource::tail(&content, max_lines);

    let scored =
        LogAnomalyScorer::from_config(config).score_logs_detailed(&records, config.contamination)?;

    let rows: Vec<LogRow> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| LogRow {
            index: idx,
            label: match format {
                OutputFormat::Table => color_label(scored.labels[idx]),
                OutputFormat::Json => scored.labels[idx].to_string(),
            },
            score: format!("{:.3}", scored.scores[idx]),
            record: match format {
                OutputFormat::Table => truncate(record, 80),
                OutputFormat::Json => record.clone(),
            },
        })
        .collect();

    print_table(&rows, format);
    if format == OutputFormat::Table {
        summarize(scored.labels.iter().filter(|l| l.is_anomalous()).count(), records.len());
    }
    Ok(())
}

fn summarize(anomalies: usize, total: usize) {
    let message = format!("{} of {} flagged as anomalous", anomalies, total);
    if anomalies > 0 {
        print_warning(&message);
    } else {
        print_info(&message);
    }
}
