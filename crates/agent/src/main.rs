//! opswatch agent
//!
//! Samples host utilisation on a timer, scores each window for
//! anomalies, derives predictive alerts and delivers them through the
//! configured notifier.

use anyhow::Result;
use opswatch_lib::{
    collector::{FileLogSource, LogSource, SystemCollector},
    health::HealthRegistry,
    observability::{AgentMetrics, StructuredLogger},
    Orchestrator,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting opswatch-agent");

    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        interval_secs = config.interval_secs,
        contamination = config.detection.contamination,
        "Agent configured"
    );

    let health_registry = HealthRegistry::for_pipeline().await;
    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    let notifier = config.notifier_settings().build()?;
    logger.log_startup(AGENT_VERSION, notifier.channel());

    let collector = Arc::new(SystemCollector::new(config.collector.clone()));
    let orchestrator = Arc::new(
        Orchestrator::new(
            config.detection.clone(),
            collector,
            notifier,
            config.recipient.clone(),
        )
        .with_health(health_registry.clone())
        .with_logger(logger.clone()),
    );
    let log_source = config
        .log_path
        .as_ref()
        .map(|path| FileLogSource::new(path).with_max_lines(config.log_max_lines));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    let pass_handle = tokio::spawn(run_passes(
        orchestrator,
        log_source,
        config.interval(),
        shutdown_tx.subscribe(),
    ));

    health_registry.set_ready(true).await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());

    if let Err(e) = pass_handle.await {
        warn!(error = %e, "Pass loop ended abnormally");
    }
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => warn!(error = %e, "API server task ended abnormally"),
        Ok(Ok(())) => {}
    }

    info!("Shut down cleanly");
    Ok(())
}

/// Run a pass per tick until shutdown; a failed pass never stops the loop
async fn run_passes(
    orchestrator: Arc<Orchestrator>,
    log_source: Option<FileLogSource>,
    interval: std::time::Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => {
                info!("Pass loop stopping");
                return;
            }
        }

        match orchestrator.run_default_pass().await {
            Ok(report) => debug!(
                samples = report.samples,
                anomalies = report.anomaly_count(),
                notification = ?report.notification,
                "Metric pass finished"
            ),
            Err(e) => error!(error = %e, "Metric pass failed"),
        }

        let Some(source) = &log_source else {
            continue;
        };
        match source.read_batch().await {
            Ok(records) if records.is_empty() => debug!("No log records to score"),
            Ok(records) => {
                if let Err(e) = orchestrator.run_log_pass(&records).await {
                    error!(error = %e, "Log pass failed");
                }
            }
            Err(e) => warn!(error = %format!("{:#}", e), "Failed to read log batch"),
        }
    }
}
