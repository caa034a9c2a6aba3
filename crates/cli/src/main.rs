//! opswatch CLI
//!
//! Scores metric and log files offline, samples the local host and sends
//! test alerts through the same transports the agent uses.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{alert, sample, score};
use opswatch_lib::DetectionConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "opswatch")]
#[command(author, version, about = "opswatch anomaly scoring and alerting", long_about = None)]
pub struct Cli {
    /// Expected fraction of anomalies, in (0, 1)
    #[arg(long, global = true, env = "OPSWATCH_DETECTION__CONTAMINATION")]
    pub contamination: Option<f64>,

    /// Seed for reproducible labels
    #[arg(long, global = true, env = "OPSWATCH_DETECTION__RANDOM_SEED")]
    pub seed: Option<u64>,

    /// Output format
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score a JSON array of metric samples
    ScoreMetrics {
        /// Path to the JSON file
        #[arg(long)]
        file: PathBuf,
    },

    /// Score the lines of a log file
    ScoreLogs {
        /// Path to the log file
        #[arg(long)]
        file: PathBuf,

        /// Only score the last N non-empty lines
        #[arg(long, default_value = "500")]
        max_lines: usize,
    },

    /// Sample this host and score the collected window
    Sample {
        /// Number of samples to take
        #[arg(long, default_value = "10")]
        count: usize,

        /// Seconds between samples
        #[arg(long, default_value = "1")]
        interval_secs: u64,

        /// Mount point whose disk usage is reported
        #[arg(long, default_value = "/")]
        disk_mount: PathBuf,
    },

    /// Deliver a test alert through the configured channel
    SendTestAlert {
        /// Recipient address
        #[arg(long)]
        to: Option<String>,

        #[arg(long, default_value = "AIOps Alert")]
        subject: String,

        #[arg(long, default_value = "CPU usage is high")]
        body: String,

        /// Seconds to wait for the transport
        #[arg(long, default_value = "10", env = "OPSWATCH_DETECTION__NOTIFY_TIMEOUT_SECONDS")]
        timeout_secs: u64,

        #[arg(long, env = "OPSWATCH_SMTP__HOST")]
        smtp_host: Option<String>,

        #[arg(long, default_value = "587", env = "OPSWATCH_SMTP__PORT")]
        smtp_port: u16,

        #[arg(long, env = "OPSWATCH_SMTP__USERNAME")]
        smtp_username: Option<String>,

        #[arg(long, env = "OPSWATCH_SMTP__PASSWORD", hide_env_values = true)]
        smtp_password: Option<String>,

        /// Sender address; defaults to the username
        #[arg(long, env = "OPSWATCH_SMTP__FROM")]
        smtp_from: Option<String>,

        /// Skip STARTTLS (local relays only)
        #[arg(long)]
        smtp_plaintext: bool,

        #[arg(long, env = "OPSWATCH_WEBHOOK__URL")]
        webhook_url: Option<String>,

        #[arg(long, env = "OPSWATCH_WEBHOOK__BEARER_TOKEN", hide_env_values = true)]
        webhook_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let defaults = config::Config::load()?;

    let mut detection = DetectionConfig::default();
    if let Some(contamination) = cli.contamination.or(defaults.contamination) {
        detection.contamination = contamination;
    }
    detection.random_seed = cli.seed.or(defaults.random_seed);
    let format = cli.format.or(defaults.default_format).unwrap_or_default();

    match cli.command {
        Commands::ScoreMetrics { file } => {
            score::score_metrics(&file, &detection, format)?;
        }
        Commands::ScoreLogs { file, max_lines } => {
            score::score_logs(&file, max_lines, &detection, format)?;
        }
        Commands::Sample {
            count,
            interval_secs,
            disk_mount,
        } => {
            sample::sample_host(
                count,
                Duration::from_secs(interval_secs),
                disk_mount,
                &detection,
                format,
            )
            .await?;
        }
        Commands::SendTestAlert {
            to,
            subject,
            body,
            timeout_secs,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            smtp_from,
            smtp_plaintext,
            webhook_url,
            webhook_token,
        } => {
            let Some(recipient) = to.or(defaults.default_recipient) else {
                anyhow::bail!("No recipient: pass --to or set default_recipient in the config file");
            };
            let transport = alert::TransportArgs {
                smtp_host,
                smtp_port,
                smtp_username,
                smtp_password,
                smtp_from,
                smtp_plaintext,
                webhook_url,
                webhook_token,
            };
            alert::send_test_alert(
                &transport,
                &recipient,
                &subject,
                &body,
                Duration::from_secs(timeout_secs),
            )
            .await?;
        }
    }

    Ok(())
}
