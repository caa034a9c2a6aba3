//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use opswatch_lib::{AnomalyLabel, NotifyError};
use serde::{Deserialize, Serialize};
use tabled::{settings::Style, Table, Tabled};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn color_label(label: AnomalyLabel) -> String {
    match label {
        AnomalyLabel::Normal => label.to_string().green().to_string(),
        AnomalyLabel::Anomalous => label.to_string().red().bold().to_string(),
    }
}

/// Isolation score, red once past the batch threshold
pub fn color_score(score: f64, threshold: f64) -> String {
    let formatted = format!("{:.3}", score);
    if threshold > 0.0 && score > threshold {
        formatted.red().to_string()
    } else {
        formatted
    }
}

pub fn describe_notify_error(err: &NotifyError) -> String {
    format!("{} ({})", err, err.kind().yellow())
}

/// Shorten `text` to `max` characters, marking the cut
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Failed password for root", 7), "Failed…");
    }

    #[test]
    fn test_score_below_threshold_is_plain() {
        assert_eq!(color_score(0.41234, 0.6), "0.412");
    }
}
