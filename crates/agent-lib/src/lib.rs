//! Core of the opswatch host monitoring agent
//!
//! This crate provides:
//! - Unsupervised anomaly scoring of metric batches and log lines
//! - Threshold and trend based predictive alerts
//! - A pluggable notifier capability with SMTP, webhook and log transports
//! - The pass orchestrator tying collection, scoring and notification together
//! - Health checks and observability

pub mod anomaly;
pub mod collector;
pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod notifier;
pub mod observability;
pub mod orchestrator;
pub mod predictor;

pub use anomaly::{score, score_logs, AnomalyScorer, LogAnomalyScorer, ScoredBatch};
pub use config::{AlertThresholds, DetectionConfig};
pub use error::{DetectionError, NotifyError, PassError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use notifier::{Notifier, NotifierSettings};
pub use observability::{AgentMetrics, StructuredLogger};
pub use orchestrator::{NotificationOutcome, Orchestrator, PassReport, PassState};
pub use predictor::{predict, AlertGenerator};
